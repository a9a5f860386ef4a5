//! Language detection from file extensions

/// Detect language from a file extension (without the leading dot)
pub fn detect_language(extension: &str) -> Option<&'static str> {
    let lang = match extension.to_lowercase().as_str() {
        "rs" => "Rust",
        "py" => "Python",
        "js" | "mjs" | "cjs" => "JavaScript",
        "jsx" => "JavaScript (JSX)",
        "ts" | "mts" | "cts" => "TypeScript",
        "tsx" => "TypeScript (TSX)",
        "java" => "Java",
        "cpp" | "cc" | "cxx" => "C++",
        "c" => "C",
        "h" | "hpp" => "C/C++ Header",
        "cs" => "C#",
        "go" => "Go",
        "rb" => "Ruby",
        "php" => "PHP",
        "swift" => "Swift",
        "kt" | "kts" => "Kotlin",
        "scala" => "Scala",
        "sh" | "bash" => "Shell",
        "sql" => "SQL",
        "vue" => "Vue",
        "svelte" => "Svelte",

        "html" | "htm" => "HTML",
        "css" => "CSS",
        "scss" | "sass" => "SCSS",

        "json" => "JSON",
        "yaml" | "yml" => "YAML",
        "toml" => "TOML",
        "xml" => "XML",
        "md" | "markdown" => "Markdown",

        _ => return None,
    };

    Some(lang)
}

/// Extension of a repository-relative path, lowercased, without the dot.
pub fn extension_of(path: &str) -> String {
    std::path::Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Languages whose sources use `async`/`await` the ECMAScript way.
pub fn is_ecmascript(language: &str) -> bool {
    language.starts_with("JavaScript") || language.starts_with("TypeScript")
}
