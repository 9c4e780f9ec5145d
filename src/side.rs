use crate::record::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Resolve a side indicator of unknown representation.
    ///
    /// Checked in order: text starting with `B`, text starting with `A`
    /// (both case-insensitive), an integer (`0` is bid, anything else ask),
    /// and finally a `bid` prefix. Anything left over resolves to `Ask`.
    pub fn resolve(value: &FieldValue) -> Side {
        let text = value.text();
        let upper = text.to_ascii_uppercase();
        if upper.starts_with('B') {
            return Side::Bid;
        }
        if upper.starts_with('A') {
            return Side::Ask;
        }
        if let Some(v) = value.as_int() {
            return if v == 0 { Side::Bid } else { Side::Ask };
        }
        if text.to_ascii_lowercase().starts_with("bid") {
            Side::Bid
        } else {
            Side::Ask
        }
    }

    /// Resolve an optional side field; a missing side counts as a bid.
    pub fn resolve_field(value: Option<&FieldValue>) -> Side {
        value.map_or(Side::Bid, Side::resolve)
    }

    pub fn as_char(self) -> char {
        match self {
            Side::Bid => 'B',
            Side::Ask => 'A',
        }
    }
}
