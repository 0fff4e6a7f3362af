//! Pure helpers for the TypeSpec → ebusd CSV conversion step.
//!
//! The converter (`tsp2ebusd`) derives the circuit name of the generated
//! definitions from the name of its input file.  Input files are temporary, so
//! their name starts with a random placeholder token; after conversion the
//! token is replaced by a human-meaningful circuit name.
//!
//! Spawning the converter and handling the temporary files lives in
//! `ebus-notebook`'s infrastructure layer.  This module only prepares text.

use regex::Regex;

/// Fixed start of every placeholder token.
pub const PLACEHOLDER_PREFIX: &str = "_generatedMain_";

/// Circuit name used when no file name hint is available.
pub const DEFAULT_CIRCUIT_NAME: &str = "Main";

/// Declaration making the eBUS TypeSpec library names visible.
pub const NAMESPACE_USING: &str = "using Ebus;";

/// Placeholder in the conversion command template for the input file.
pub const IN_FILE_PLACEHOLDER: &str = "${inFile}";

/// Placeholder in the conversion command template for the output file.
pub const OUT_FILE_PLACEHOLDER: &str = "${outFile}";

/// Generates a fresh placeholder token such as `_generatedMain_3fa9c1_`.
///
/// Six hex digits from a v4 UUID keep concurrent conversions apart while the
/// token stays a valid TypeSpec identifier.
pub fn generate_placeholder() -> String {
    let id = uuid::Uuid::new_v4();
    let b = id.as_bytes();
    format!("{PLACEHOLDER_PREFIX}{:02x}{:02x}{:02x}_", b[0], b[1], b[2])
}

/// Inserts [`NAMESPACE_USING`] before the first declaration line.
///
/// Leading blank lines, `//` comments, `import ` and `using ` lines are
/// skipped.  Nothing is inserted when one of those leading lines already is
/// the Ebus using declaration, or when the input has no other line at all.
///
/// # Example
///
/// ```rust
/// use ebus_core::conversion::prepare_input;
///
/// let src = "import \"@ebusd/ebus-typespec\";\nnamespace bai {}";
/// assert_eq!(
///     prepare_input(src),
///     "import \"@ebusd/ebus-typespec\";\nusing Ebus;\nnamespace bai {}"
/// );
/// ```
pub fn prepare_input(input: &str) -> String {
    let mut lines: Vec<&str> = input.split('\n').collect();
    let mut already_using = false;
    let position = lines.iter().position(|line| {
        let line = line.trim();
        if line.starts_with("using ") {
            already_using |= line.trim_end_matches(';').trim() == "using Ebus";
            return false;
        }
        !(line.is_empty() || line.starts_with("//") || line.starts_with("import "))
    });
    if let (Some(idx), false) = (position, already_using) {
        lines.insert(idx, NAMESPACE_USING);
    }
    lines.join("\n")
}

/// Derives the circuit name from a file name hint.
///
/// The base name without extension is capitalised (`kitchen.tsp` →
/// `Kitchen`).  Without a usable hint, [`DEFAULT_CIRCUIT_NAME`] is returned.
pub fn circuit_name(file_name_hint: Option<&str>) -> String {
    let stem = file_name_hint
        .map(std::path::Path::new)
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty());
    let Some(stem) = stem else {
        return DEFAULT_CIRCUIT_NAME.to_string();
    };
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => DEFAULT_CIRCUIT_NAME.to_string(),
    }
}

/// Replaces the placeholder (plus the rest of its CSV field) with `name`.
///
/// Only the first occurrence per line is replaced: the converter puts the
/// generated circuit name into one column of each definition line.
///
/// # Errors
///
/// Returns the regex error if the pattern cannot be compiled, which only
/// happens for pathological placeholder lengths.
pub fn rename_placeholder(output: &str, placeholder: &str, name: &str) -> Result<String, regex::Error> {
    let pattern = Regex::new(&format!("{}[^,]*", regex::escape(placeholder)))?;
    Ok(output
        .split('\n')
        .map(|line| pattern.replace(line, regex::NoExpand(name)).into_owned())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Substitutes the artifact paths into the conversion command template.
pub fn expand_command(template: &str, in_file: &str, out_file: &str) -> String {
    template
        .replace(IN_FILE_PLACEHOLDER, in_file)
        .replace(OUT_FILE_PLACEHOLDER, out_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_shape() {
        let p = generate_placeholder();
        assert!(p.starts_with(PLACEHOLDER_PREFIX));
        assert!(p.ends_with('_'));
        let hex = &p[PLACEHOLDER_PREFIX.len()..p.len() - 1];
        assert_eq!(hex.len(), 6);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_placeholders_differ() {
        // 24 random bits: two draws colliding is a one in sixteen million event.
        assert_ne!(generate_placeholder(), generate_placeholder());
    }

    #[test]
    fn test_prepare_input_inserts_before_first_declaration() {
        let src = "// header\n\nimport \"x\";\n@zz(0x08)\nnamespace bai {}";
        assert_eq!(
            prepare_input(src),
            "// header\n\nimport \"x\";\nusing Ebus;\n@zz(0x08)\nnamespace bai {}"
        );
    }

    #[test]
    fn test_prepare_input_keeps_existing_using() {
        let src = "import \"x\";\nusing Ebus;\nnamespace bai {}";
        assert_eq!(prepare_input(src), src);
    }

    #[test]
    fn test_prepare_input_other_using_still_inserts() {
        let src = "using Other;\nmodel m {}";
        assert_eq!(prepare_input(src), "using Other;\nusing Ebus;\nmodel m {}");
    }

    #[test]
    fn test_prepare_input_without_declarations_is_unchanged() {
        let src = "// nothing here\n";
        assert_eq!(prepare_input(src), src);
    }

    #[test]
    fn test_circuit_name_from_hint() {
        assert_eq!(circuit_name(Some("kitchen.tsp")), "Kitchen");
        assert_eq!(circuit_name(Some("/home/me/heating/bai.tsp")), "Bai");
        assert_eq!(circuit_name(Some("hwc")), "Hwc");
    }

    #[test]
    fn test_circuit_name_defaults_to_main() {
        assert_eq!(circuit_name(None), "Main");
        assert_eq!(circuit_name(Some("")), "Main");
    }

    #[test]
    fn test_rename_placeholder_replaces_field() {
        let out = rename_placeholder(
            "_generatedMain_abc123_,circuit,name\n",
            "_generatedMain_abc123_",
            "Kitchen",
        )
        .unwrap();
        assert_eq!(out, "Kitchen,circuit,name\n");
    }

    #[test]
    fn test_rename_placeholder_consumes_suffix_until_comma() {
        let out = rename_placeholder("r,_p_.bai,temp", "_p_", "Kitchen").unwrap();
        assert_eq!(out, "r,Kitchen,temp");
    }

    #[test]
    fn test_rename_placeholder_name_is_literal() {
        let out = rename_placeholder("_p_,x", "_p_", "$1").unwrap();
        assert_eq!(out, "$1,x");
    }

    #[test]
    fn test_expand_command() {
        let cmd = expand_command("tool -o ${outFile} ${inFile}", "/tmp/in.tsp", "/tmp/out");
        assert_eq!(cmd, "tool -o /tmp/out /tmp/in.tsp");
    }
}
