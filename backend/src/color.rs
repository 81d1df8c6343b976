/// Converts `#rgb` / `#rrggbb` hex notation into its integer value.
///
/// The short form is read literally, `#fff` is 4095 and not 0xffffff.
/// Anything else, including a missing input, yields `None`.
pub fn normalize(input: Option<&str>) -> Option<i64> {
    let digits = input?.strip_prefix('#')?;
    if !matches!(digits.len(), 3 | 6) || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    i64::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::normalize;

    #[test]
    fn six_digit_colors() {
        assert_eq!(normalize(Some("#ff0000")), Some(0xff0000));
        assert_eq!(normalize(Some("#00FF7f")), Some(0x00ff7f));
        assert_eq!(normalize(Some("#000000")), Some(0));
    }

    #[test]
    fn short_form_is_not_expanded() {
        assert_eq!(normalize(Some("#fff")), Some(4095));
        assert_eq!(normalize(Some("#0A0")), Some(0x0a0));
    }

    #[test]
    fn rejects_everything_else() {
        for input in [
            "ff0000", "#ff00", "#ff00000", "#", "", "#ggg", "#12 345", "#+ff", "#-ff", " #fff",
            "notacolor", "#fff\n",
        ] {
            assert_eq!(normalize(Some(input)), None, "{input:?}");
        }
        assert_eq!(normalize(None), None);
    }
}
