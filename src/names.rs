//! Lexical checks for XML names, NCNames and name tokens.

use crate::chvalid::XmlCharValid;

/// Return the byte length of the longest NCName at the start of `name`.
///
/// Returns 0 if `name` does not start with an NCName start character.
pub fn parse_ncname(name: &str) -> usize {
    let mut chars = name.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ncname_start_char() => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !c.is_ncname_char())
        .map_or(name.len(), |(pos, _)| pos)
}

/// Return the byte length of the longest run of NCName characters at the
/// start of `name`.
///
/// The first character is not required to be a name start character.
pub fn parse_nmtoken(name: &str) -> usize {
    name.char_indices()
        .find(|(_, c)| !c.is_ncname_char())
        .map_or(name.len(), |(pos, _)| pos)
}

/// Check that `name` matches the `Name` production (colons allowed).
#[doc(alias = "xmlValidateName")]
pub fn validate_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_name_start_char()) && chars.all(|c| c.is_name_char())
}

/// Check that `name` matches the `NCName` production.
#[doc(alias = "xmlValidateNCName")]
pub fn validate_ncname(name: &str) -> bool {
    !name.is_empty() && parse_ncname(name) == name.len()
}

/// Check that `name` matches the `Nmtoken` production (colons allowed).
#[doc(alias = "xmlValidateNMToken")]
pub fn validate_nmtoken(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_name_char())
}

/// Check a name handed to the writer.
///
/// With namespace support the name must be an NCName, or, unless
/// `ncname_only` is set, an NCName followed by a single colon and a run
/// of NCName characters. The part after the colon only has to be a name
/// token, so `a:1b` is accepted. Without namespace support any `Name` is
/// accepted.
pub(crate) fn check_name(name: &str, ncname_only: bool, namespaces: bool) -> bool {
    if name.is_empty() {
        return false;
    }
    if !namespaces {
        return validate_name(name);
    }

    let mut pos = parse_ncname(name);
    if pos == name.len() {
        return true;
    }
    if ncname_only || pos == 0 || name.as_bytes()[pos] != b':' || pos + 1 == name.len() {
        return false;
    }
    pos += 1;
    pos += parse_nmtoken(&name[pos..]);
    pos == name.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ncname_prefix_length() {
        assert_eq!(parse_ncname("abc:def"), 3);
        assert_eq!(parse_ncname("1abc"), 0);
        assert_eq!(parse_ncname(""), 0);
        assert_eq!(parse_ncname("a-b.c"), 5);
        assert_eq!(parse_ncname("\u{3042}\u{3044}"), 6);
        assert_eq!(parse_nmtoken("1abc def"), 4);
    }

    #[test]
    fn productions() {
        assert!(validate_name("a:b:c"));
        assert!(validate_name(":a"));
        assert!(!validate_name("1a"));
        assert!(validate_ncname("a.b-c"));
        assert!(!validate_ncname("a:b"));
        assert!(validate_nmtoken("1:a"));
        assert!(!validate_nmtoken(""));
        assert!(!validate_nmtoken("a b"));
    }

    #[test]
    fn writer_names_with_namespaces() {
        assert!(check_name("root", false, true));
        assert!(check_name("p:root", false, true));
        // the local part is only checked as a name token
        assert!(check_name("a:1b", false, true));
        assert!(!check_name(":a", false, true));
        assert!(!check_name("a:", false, true));
        assert!(!check_name("a:b:c", false, true));
        assert!(!check_name("p:root", true, true));
        assert!(!check_name("", false, true));
        assert!(!check_name("a b", false, true));
    }

    #[test]
    fn writer_names_without_namespaces() {
        assert!(check_name("a:b:c", false, false));
        assert!(check_name(":a", true, false));
        assert!(!check_name("1a", false, false));
    }
}
