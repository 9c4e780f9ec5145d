//! Record classification and field extraction.
//!
//! [`normalize`] turns one decoded [`RawRecord`] into at most one
//! [`CanonicalEvent`]. Records that do not look like order events (missing
//! action, order id, price or size/qty) and records whose action code is not
//! recognized are skipped, never reported as errors: a decoded stream
//! routinely interleaves status and summary records with MBO ones.
use crate::event::{CanonicalEvent, EventKind};
use crate::record::RawRecord;
use crate::side::Side;

/// Action prefixes in match order; the first row with a matching prefix wins.
const ACTION_PREFIXES: [(&[&str], EventKind); 5] = [
    (&["add", "a"], EventKind::Add),
    (&["mod", "r"], EventKind::Mod),
    (&["cxl", "cancel", "d"], EventKind::Cxl),
    (&["trd", "trade", "p"], EventKind::Trd),
    (&["clear"], EventKind::Clr),
];

/// True when the record carries every field an order event needs.
pub fn is_order_event(rec: &RawRecord) -> bool {
    rec.action.is_some()
        && rec.order_id.is_some()
        && rec.price.is_some()
        && (rec.size.is_some() || rec.qty.is_some())
}

/// Classify an action code by lower-cased prefix.
pub fn classify_action(action: &str) -> Option<EventKind> {
    let action = action.to_ascii_lowercase();
    ACTION_PREFIXES
        .iter()
        .find(|(prefixes, _)| prefixes.iter().any(|p| action.starts_with(p)))
        .map(|&(_, kind)| kind)
}

/// Classify a record, applying the order-event precondition first.
pub fn classify(rec: &RawRecord) -> Option<EventKind> {
    if !is_order_event(rec) {
        return None;
    }
    classify_action(&rec.action.as_ref()?.text())
}

/// `ts_event`, or `ts_recv` when the event time is missing or zero.
pub fn timestamp_ns(rec: &RawRecord) -> u64 {
    match rec.ts_event {
        Some(ts) if ts != 0 => ts,
        _ => rec.ts_recv.unwrap_or(0),
    }
}

/// `size`, or `qty` when size is missing or zero.
pub fn size_of(rec: &RawRecord) -> u32 {
    match rec.size {
        Some(sz) if sz != 0 => sz,
        _ => rec.qty.unwrap_or(0),
    }
}

/// Build the event of a known kind. Missing optional fields take their
/// defaults; nothing here fails.
pub fn extract(rec: &RawRecord, kind: EventKind) -> CanonicalEvent {
    let ts_ns = timestamp_ns(rec);
    let order_id = rec.order_id.unwrap_or(0);
    let price = rec.price.unwrap_or(0);
    let size = size_of(rec);
    match kind {
        EventKind::Add => CanonicalEvent::Add {
            ts_ns,
            side: Side::resolve_field(rec.side.as_ref()),
            order_id,
            price,
            size,
        },
        EventKind::Mod => CanonicalEvent::Mod {
            ts_ns,
            order_id,
            new_price: rec.new_price.unwrap_or(price),
            new_size: rec.new_size.unwrap_or(size),
        },
        EventKind::Cxl => CanonicalEvent::Cxl { ts_ns, order_id },
        EventKind::Trd => CanonicalEvent::Trd {
            ts_ns,
            order_id,
            fill_qty: if size > 0 { size } else { rec.fill_qty.unwrap_or(0) },
        },
        EventKind::Clr => CanonicalEvent::Clr { ts_ns },
    }
}

pub fn normalize(rec: &RawRecord) -> Option<CanonicalEvent> {
    classify(rec).map(|kind| extract(rec, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    fn mbo(action: &str) -> RawRecord {
        RawRecord {
            action: Some(action.into()),
            order_id: Some(100),
            price: Some(250000),
            size: Some(10),
            ts_event: Some(1690000000000000000),
            ..Default::default()
        }
    }

    #[test]
    fn add_line_end_to_end() {
        let rec = RawRecord { side: Some("B".into()), ..mbo("add") };
        let ev = normalize(&rec).unwrap();
        assert_eq!(format!("{ev}\n"), "ADD,1690000000000000000,B,100,250000,10\n");
    }

    #[test]
    fn precondition_gates_every_kind() {
        let clear = RawRecord { action: Some("clear".into()), ts_recv: Some(123), ..Default::default() };
        assert_eq!(normalize(&clear), None);

        let full = mbo("add");
        let missing = vec![
            RawRecord { action: None, ..full.clone() },
            RawRecord { order_id: None, ..full.clone() },
            RawRecord { price: None, ..full.clone() },
            RawRecord { size: None, qty: None, ..full.clone() },
        ];
        for rec in &missing {
            assert_eq!(normalize(rec), None, "{rec:?}");
        }

        // qty alone satisfies the size requirement
        let with_qty = RawRecord { size: None, qty: Some(4), ..full };
        assert!(matches!(normalize(&with_qty), Some(CanonicalEvent::Add { size: 4, .. })));
    }

    #[test]
    fn prefix_priority() {
        assert_eq!(classify_action("add_new"), Some(EventKind::Add));
        assert_eq!(classify_action("A"), Some(EventKind::Add));
        assert_eq!(classify_action("replace"), Some(EventKind::Mod));
        assert_eq!(classify_action("Modify"), Some(EventKind::Mod));
        assert_eq!(classify_action("Dxyz"), Some(EventKind::Cxl));
        assert_eq!(classify_action("cancel"), Some(EventKind::Cxl));
        assert_eq!(classify_action("cxl"), Some(EventKind::Cxl));
        assert_eq!(classify_action("T"), None);
        assert_eq!(classify_action("trade"), Some(EventKind::Trd));
        assert_eq!(classify_action("P"), Some(EventKind::Trd));
        assert_eq!(classify_action("CLEAR_BOOK"), Some(EventKind::Clr));
        // "c" alone is neither cxl, cancel nor clear
        assert_eq!(classify_action("c"), None);
        assert_eq!(classify_action("unknown_code"), None);
        assert_eq!(classify_action(""), None);
    }

    #[test]
    fn integer_action_codes_use_their_text() {
        let rec = RawRecord { action: Some(FieldValue::Int(65)), ..mbo("x") };
        assert_eq!(normalize(&rec), None);
    }

    #[test]
    fn timestamp_fallbacks() {
        let mut rec = mbo("cxl");
        assert_eq!(timestamp_ns(&rec), 1690000000000000000);
        rec.ts_event = Some(0);
        rec.ts_recv = Some(77);
        assert_eq!(timestamp_ns(&rec), 77);
        rec.ts_event = None;
        assert_eq!(timestamp_ns(&rec), 77);
        rec.ts_recv = None;
        assert_eq!(timestamp_ns(&rec), 0);
        assert_eq!(normalize(&rec), Some(CanonicalEvent::Cxl { ts_ns: 0, order_id: 100 }));
    }

    #[test]
    fn zero_size_falls_back_to_qty() {
        let rec = RawRecord { size: Some(0), qty: Some(9), ..mbo("add") };
        assert_eq!(size_of(&rec), 9);
        let rec = RawRecord { size: Some(0), qty: None, ..mbo("add") };
        assert_eq!(size_of(&rec), 0);
    }

    #[test]
    fn mod_defaults_to_price_and_size() {
        let ev = normalize(&mbo("mod")).unwrap();
        assert_eq!(ev.to_string(), "MOD,1690000000000000000,100,250000,10");

        let rec = RawRecord { new_price: Some(250100), new_size: Some(3), ..mbo("r") };
        assert_eq!(normalize(&rec).unwrap().to_string(), "MOD,1690000000000000000,100,250100,3");
    }

    #[test]
    fn trade_fill_quantity() {
        let rec = RawRecord { size: Some(0), fill_qty: Some(42), ts_event: Some(5), ..mbo("trade") };
        assert_eq!(normalize(&rec).unwrap().to_string(), "TRD,5,100,42");

        let rec = RawRecord { size: Some(7), fill_qty: Some(42), ts_event: Some(5), ..mbo("trd") };
        assert_eq!(normalize(&rec).unwrap().to_string(), "TRD,5,100,7");

        let rec = RawRecord { size: Some(0), ts_event: Some(5), ..mbo("p") };
        assert_eq!(normalize(&rec).unwrap().to_string(), "TRD,5,100,0");
    }

    #[test]
    fn clear_with_full_fields() {
        let rec = RawRecord { ts_event: Some(0), ts_recv: Some(123), ..mbo("clear") };
        assert_eq!(normalize(&rec), Some(CanonicalEvent::Clr { ts_ns: 123 }));
    }

    #[test]
    fn add_side_resolution() {
        let ask = RawRecord { side: Some(FieldValue::Int(1)), ..mbo("add") };
        assert!(matches!(normalize(&ask), Some(CanonicalEvent::Add { side: Side::Ask, .. })));
        let missing = mbo("add");
        assert!(matches!(normalize(&missing), Some(CanonicalEvent::Add { side: Side::Bid, .. })));
    }
}
