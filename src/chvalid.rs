//! Character class predicates of XML 1.0 (Fifth Edition).

pub trait XmlCharValid {
    /// Production [2] `Char`.
    fn is_xml_char(&self) -> bool;
    /// Production [3] `S`, for a single character.
    fn is_xml_blank_char(&self) -> bool;
    // The two following functions correspond to the productions [4] and [4a]
    // of the Fifth Edition. Letter, Digit, CombiningChar and Extender are
    // not needed anymore.
    fn is_name_start_char(&self) -> bool;
    fn is_name_char(&self) -> bool;
    /// `NameStartChar` without the colon (Namespaces in XML 1.0, production [4]).
    fn is_ncname_start_char(&self) -> bool;
    /// `NameChar` without the colon.
    fn is_ncname_char(&self) -> bool;
}

impl XmlCharValid for u32 {
    fn is_xml_char(&self) -> bool {
        let c = *self;
        c == 0x9
            || c == 0xA
            || c == 0xD
            || (0x20..=0xD7FF).contains(&c)
            || (0xE000..=0xFFFD).contains(&c)
            || (0x10000..=0x10FFFF).contains(&c)
    }

    fn is_xml_blank_char(&self) -> bool {
        matches!(*self, 0x20 | 0x9 | 0xA | 0xD)
    }

    fn is_name_start_char(&self) -> bool {
        *self == b':' as u32 || self.is_ncname_start_char()
    }

    fn is_name_char(&self) -> bool {
        *self == b':' as u32 || self.is_ncname_char()
    }

    fn is_ncname_start_char(&self) -> bool {
        let c = *self;
        (c >= b'a' as u32 && c <= b'z' as u32)
            || (c >= b'A' as u32 && c <= b'Z' as u32)
            || c == b'_' as u32
            || (0xC0..=0xD6).contains(&c)
            || (0xD8..=0xF6).contains(&c)
            || (0xF8..=0x2FF).contains(&c)
            || (0x370..=0x37D).contains(&c)
            || (0x37F..=0x1FFF).contains(&c)
            || (0x200C..=0x200D).contains(&c)
            || (0x2070..=0x218F).contains(&c)
            || (0x2C00..=0x2FEF).contains(&c)
            || (0x3001..=0xD7FF).contains(&c)
            || (0xF900..=0xFDCF).contains(&c)
            || (0xFDF0..=0xFFFD).contains(&c)
            || (0x10000..=0xEFFFF).contains(&c)
    }

    fn is_ncname_char(&self) -> bool {
        let c = *self;
        self.is_ncname_start_char()
            || (c >= b'0' as u32 && c <= b'9' as u32)
            || c == b'-' as u32
            || c == b'.' as u32
            || c == 0xB7
            || (0x300..=0x36F).contains(&c)
            || (0x203F..=0x2040).contains(&c)
    }
}

impl XmlCharValid for char {
    fn is_xml_char(&self) -> bool {
        (*self as u32).is_xml_char()
    }

    fn is_xml_blank_char(&self) -> bool {
        (*self as u32).is_xml_blank_char()
    }

    fn is_name_start_char(&self) -> bool {
        (*self as u32).is_name_start_char()
    }

    fn is_name_char(&self) -> bool {
        (*self as u32).is_name_char()
    }

    fn is_ncname_start_char(&self) -> bool {
        (*self as u32).is_ncname_start_char()
    }

    fn is_ncname_char(&self) -> bool {
        (*self as u32).is_ncname_char()
    }
}
