//! Reference-counted localizable strings

use super::ScriptError;
use super::registry::Registry;

#[derive(Debug)]
struct ZString {
    text: String,
    refs: u32,
}

/// Strings handed out through the ZString suite.
///
/// The shared empty string is created with the table and is never freed.
#[derive(Debug)]
pub struct ZStringTable {
    strings: Registry<ZString>,
    empty: usize,
}

impl Default for ZStringTable {
    fn default() -> Self {
        let mut strings = Registry::new();
        // a fresh registry always has room for its first entry
        let empty = strings
            .insert(ZString {
                text: String::new(),
                refs: 1,
            })
            .unwrap_or(1);
        ZStringTable { strings, empty }
    }
}

impl ZStringTable {
    /// Table holding only the shared empty string
    pub fn new() -> Self {
        Self::default()
    }

    /// New string with one reference
    pub fn make(&mut self, text: impl Into<String>) -> Result<usize, ScriptError> {
        self.strings.insert(ZString {
            text: text.into(),
            refs: 1,
        })
    }

    /// The shared empty string
    pub fn empty(&self) -> usize {
        self.empty
    }

    /// Text of a string
    pub fn get(&self, id: usize) -> Result<&str, ScriptError> {
        self.strings.get(id).map(|z| z.text.as_str())
    }

    /// Independent copy with one reference
    pub fn copy(&mut self, id: usize) -> Result<usize, ScriptError> {
        let text = self.get(id)?.to_owned();
        self.make(text)
    }

    /// Add a reference
    pub fn add_ref(&mut self, id: usize) -> Result<(), ScriptError> {
        let z = self.strings.get_mut(id)?;
        z.refs = z.refs.saturating_add(1);
        Ok(())
    }

    /// Drop a reference, freeing the string at zero
    pub fn release(&mut self, id: usize) -> Result<(), ScriptError> {
        if id == self.empty {
            return self.strings.get(id).map(|_| ());
        }
        let z = self.strings.get_mut(id)?;
        z.refs = z.refs.saturating_sub(1);
        if z.refs == 0 {
            self.strings.remove(id)?;
        }
        Ok(())
    }

    fn edit(&mut self, id: usize, f: impl FnOnce(&str) -> String) -> Result<(), ScriptError> {
        if id == self.empty {
            return Ok(());
        }
        let z = self.strings.get_mut(id)?;
        z.text = f(&z.text);
        Ok(())
    }

    /// Replace the `^index` placeholder with the text of another string
    pub fn replace(&mut self, id: usize, index: u32, replacement: usize) -> Result<(), ScriptError> {
        let replacement = self.get(replacement)?.to_owned();
        let marker = format!("^{index}");
        self.edit(id, |text| text.replace(&marker, &replacement))
    }

    /// Whether `replace` with this index would change the string
    pub fn will_replace(&self, id: usize, index: u32) -> Result<bool, ScriptError> {
        Ok(self.get(id)?.contains(&format!("^{index}")))
    }

    /// Strip a trailing ellipsis
    pub fn trim_ellipsis(&mut self, id: usize) -> Result<(), ScriptError> {
        self.edit(id, |text| {
            text.strip_suffix("...")
                .or_else(|| text.strip_suffix('\u{2026}'))
                .unwrap_or(text)
                .to_owned()
        })
    }

    /// Strip leading and trailing white space
    pub fn trim_spaces(&mut self, id: usize) -> Result<(), ScriptError> {
        self.edit(id, |text| text.trim().to_owned())
    }

    /// Remove menu accelerator markers, `&&` stays a literal ampersand
    pub fn remove_accelerators(&mut self, id: usize) -> Result<(), ScriptError> {
        self.edit(id, |text| {
            let mut out = String::with_capacity(text.len());
            let mut chars = text.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '&' {
                    if chars.peek() == Some(&'&') {
                        chars.next();
                        out.push('&');
                    }
                    continue;
                }
                out.push(c);
            }
            out
        })
    }

    /// Number of live strings, the shared empty string included
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Only the shared empty string remains
    pub fn is_empty(&self) -> bool {
        self.strings.len() <= 1
    }
}

/// Format a 16.16 fixed value with `places` decimals
pub fn romanize_fixed(value: i32, places: i16, trim: bool, is_signed: bool) -> String {
    let number = if is_signed {
        f64::from(value) / 65536.0
    } else {
        f64::from(value as u32) / 65536.0
    };
    let places = usize::try_from(places).unwrap_or(0);
    let mut text = format!("{number:.places$}");
    if trim && text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_owned();
    }
    text
}

/// Decode a C string: UTF-8 when valid, otherwise one char per byte
pub fn decode_c_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Encode as a Pascal string of at most 255 bytes
pub fn to_pascal(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let len = bytes.len().min(255);
    let mut out = Vec::with_capacity(len + 1);
    out.push(len as u8);
    out.extend_from_slice(&bytes[..len]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_frees_at_zero_references() {
        let mut table = ZStringTable::new();
        let id = table.make("Radius").unwrap();
        table.add_ref(id).unwrap();
        table.release(id).unwrap();
        assert_eq!(table.get(id), Ok("Radius"));
        table.release(id).unwrap();
        assert_eq!(table.get(id), Err(ScriptError::InvalidId));
        assert_eq!(table.release(id), Err(ScriptError::InvalidId));
    }

    #[test]
    fn test_empty_string_survives_release() {
        let mut table = ZStringTable::new();
        let empty = table.empty();
        table.release(empty).unwrap();
        table.release(empty).unwrap();
        assert_eq!(table.get(empty), Ok(""));
    }

    #[test]
    fn test_placeholder_replacement() {
        let mut table = ZStringTable::new();
        let id = table.make("Blur ^0 by ^1 pixels").unwrap();
        let what = table.make("layer").unwrap();
        let amount = table.make("4").unwrap();
        assert!(table.will_replace(id, 1).unwrap());
        table.replace(id, 0, what).unwrap();
        table.replace(id, 1, amount).unwrap();
        assert_eq!(table.get(id), Ok("Blur layer by 4 pixels"));
        assert!(!table.will_replace(id, 1).unwrap());
    }

    #[test]
    fn test_trims_and_accelerators() {
        let mut table = ZStringTable::new();
        let id = table.make("  &Open && Save...  ").unwrap();
        table.trim_spaces(id).unwrap();
        table.trim_ellipsis(id).unwrap();
        table.remove_accelerators(id).unwrap();
        assert_eq!(table.get(id), Ok("Open & Save"));
    }

    #[test]
    fn test_romanize_fixed() {
        assert_eq!(romanize_fixed(0x18000, 2, false, true), "1.50");
        assert_eq!(romanize_fixed(0x18000, 3, true, true), "1.5");
        assert_eq!(romanize_fixed(-0x10000, 0, false, true), "-1");
    }

    #[test]
    fn test_c_text_falls_back_to_bytes() {
        assert_eq!(decode_c_text(b"caf\xc3\xa9"), "café");
        assert_eq!(decode_c_text(b"caf\xe9"), "café");
    }

    #[test]
    fn test_pascal_is_length_prefixed_and_capped() {
        assert_eq!(to_pascal("ab"), vec![2, b'a', b'b']);
        assert_eq!(to_pascal(&"x".repeat(300)).len(), 256);
    }
}
