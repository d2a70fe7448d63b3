//! Decoding of `redraw` notifications into typed screen operations.
//!
//! A redraw notification's params are a list of batches, each shaped
//! `[name, args_1, args_2, ...]`. Every argument tuple becomes one
//! [`RedrawOp`], in batch order then tuple order. Later operations depend on
//! state set by earlier ones (a `put` after a `highlight_set`), so the order
//! is never changed.

use rmpv::Value;
use tracing::{debug, warn};

/// A 24-bit `0xRRGGBB` colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u32);

impl Rgb {
    pub fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn b(self) -> u8 {
        self.0 as u8
    }

    /// Negative values mean "use the default colour".
    fn from_wire(value: i64) -> Option<Rgb> {
        u32::try_from(value).ok().map(|v| Rgb(v & 0xFF_FF_FF))
    }
}

/// Attribute changes from `highlight_set`.
///
/// `None` leaves the attribute as it was.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightUpdate {
    pub foreground: Option<Rgb>,
    pub background: Option<Rgb>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub reverse: Option<bool>,
}

/// One screen-update operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedrawOp {
    Clear,
    Resize { rows: usize, cols: usize },
    /// `None` restores the built-in default.
    SetForeground(Option<Rgb>),
    SetBackground(Option<Rgb>),
    HighlightSet(HighlightUpdate),
    EolClear,
    SetTitle(String),
    SetIcon(String),
    Put(String),
    CursorGoto { row: usize, col: usize },
    Scroll(i64),
    SetScrollRegion {
        top: usize,
        bottom: usize,
        left: usize,
        right: usize,
    },
    ModeChange(String),
    Busy(bool),
    Mouse(bool),
}

/// Operation names understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawMethod {
    Clear,
    Resize,
    UpdateFg,
    UpdateBg,
    HighlightSet,
    EolClear,
    SetTitle,
    SetIcon,
    Put,
    CursorGoto,
    Scroll,
    SetScrollRegion,
    ModeChange,
    NormalMode,
    InsertMode,
    BusyStart,
    BusyStop,
    MouseOn,
    MouseOff,
}

impl RedrawMethod {
    /// Look up a wire name. Unknown names return `None` and are skipped.
    pub fn from_name(name: &str) -> Option<Self> {
        let method = match name {
            "clear" => RedrawMethod::Clear,
            "resize" => RedrawMethod::Resize,
            "update_fg" => RedrawMethod::UpdateFg,
            "update_bg" => RedrawMethod::UpdateBg,
            "highlight_set" => RedrawMethod::HighlightSet,
            "eol_clear" => RedrawMethod::EolClear,
            "set_title" => RedrawMethod::SetTitle,
            "set_icon" => RedrawMethod::SetIcon,
            "put" => RedrawMethod::Put,
            "cursor_goto" => RedrawMethod::CursorGoto,
            "scroll" => RedrawMethod::Scroll,
            "set_scroll_region" => RedrawMethod::SetScrollRegion,
            "mode_change" => RedrawMethod::ModeChange,
            "normal_mode" => RedrawMethod::NormalMode,
            "insert_mode" => RedrawMethod::InsertMode,
            "busy_start" => RedrawMethod::BusyStart,
            "busy_stop" => RedrawMethod::BusyStop,
            "mouse_on" => RedrawMethod::MouseOn,
            "mouse_off" => RedrawMethod::MouseOff,
            _ => return None,
        };
        Some(method)
    }

    /// Build the operation for one argument tuple.
    fn decode_args(self, args: &[Value]) -> Option<RedrawOp> {
        let op = match self {
            RedrawMethod::Clear => RedrawOp::Clear,
            // The engine sends width first.
            RedrawMethod::Resize => RedrawOp::Resize {
                cols: arg_usize(args, 0)?,
                rows: arg_usize(args, 1)?,
            },
            RedrawMethod::UpdateFg => RedrawOp::SetForeground(Rgb::from_wire(arg_i64(args, 0)?)),
            RedrawMethod::UpdateBg => RedrawOp::SetBackground(Rgb::from_wire(arg_i64(args, 0)?)),
            RedrawMethod::HighlightSet => RedrawOp::HighlightSet(decode_highlight(args.first()?)?),
            RedrawMethod::EolClear => RedrawOp::EolClear,
            RedrawMethod::SetTitle => RedrawOp::SetTitle(arg_text(args, 0)?),
            RedrawMethod::SetIcon => RedrawOp::SetIcon(arg_text(args, 0)?),
            RedrawMethod::Put => RedrawOp::Put(arg_text(args, 0)?),
            RedrawMethod::CursorGoto => RedrawOp::CursorGoto {
                row: arg_usize(args, 0)?,
                col: arg_usize(args, 1)?,
            },
            RedrawMethod::Scroll => RedrawOp::Scroll(arg_i64(args, 0)?),
            RedrawMethod::SetScrollRegion => RedrawOp::SetScrollRegion {
                top: arg_usize(args, 0)?,
                bottom: arg_usize(args, 1)?,
                left: arg_usize(args, 2)?,
                right: arg_usize(args, 3)?,
            },
            RedrawMethod::ModeChange => RedrawOp::ModeChange(arg_text(args, 0)?),
            RedrawMethod::NormalMode => RedrawOp::ModeChange("normal".to_string()),
            RedrawMethod::InsertMode => RedrawOp::ModeChange("insert".to_string()),
            RedrawMethod::BusyStart => RedrawOp::Busy(true),
            RedrawMethod::BusyStop => RedrawOp::Busy(false),
            RedrawMethod::MouseOn => RedrawOp::Mouse(true),
            RedrawMethod::MouseOff => RedrawOp::Mouse(false),
        };
        Some(op)
    }
}

/// Decode one notification's params into an ordered operation list.
///
/// Unknown operation names and argument tuples of the wrong shape are
/// dropped; neither stops the rest of the batch.
pub fn decode_batch(params: Vec<Value>) -> Vec<RedrawOp> {
    let mut ops = Vec::with_capacity(params.len());

    for batch in params {
        let Value::Array(items) = batch else {
            warn!("Redraw batch is not an array: {}", batch);
            continue;
        };
        let mut items = items.into_iter();

        let name = match items.next() {
            Some(Value::String(s)) => s.into_str(),
            Some(Value::Binary(bytes)) => String::from_utf8(bytes).ok(),
            _ => None,
        };
        let Some(name) = name else {
            warn!("Redraw batch without an operation name");
            continue;
        };

        let Some(method) = RedrawMethod::from_name(&name) else {
            debug!("Skipping unknown redraw operation {}", name);
            continue;
        };

        for tuple in items {
            let decoded = match &tuple {
                Value::Array(args) => method.decode_args(args),
                _ => None,
            };
            match decoded {
                Some(op) => ops.push(op),
                None => warn!("Malformed {} arguments: {}", name, tuple),
            }
        }
    }

    ops
}

fn arg_i64(args: &[Value], index: usize) -> Option<i64> {
    args.get(index)?.as_i64()
}

fn arg_usize(args: &[Value], index: usize) -> Option<usize> {
    usize::try_from(args.get(index)?.as_u64()?).ok()
}

/// Text arrives as str or, from older engines, as raw bytes.
fn arg_text(args: &[Value], index: usize) -> Option<String> {
    match args.get(index)? {
        Value::String(s) => Some(match s.as_str() {
            Some(text) => text.to_string(),
            None => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        }),
        Value::Binary(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

fn decode_highlight(attrs: &Value) -> Option<HighlightUpdate> {
    let mut update = HighlightUpdate::default();
    for (key, value) in attrs.as_map()? {
        // Older engines send keys as raw bytes.
        let key = match key {
            Value::String(s) => s.as_str(),
            Value::Binary(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        };
        let Some(key) = key else {
            continue;
        };
        match key {
            "foreground" => update.foreground = value.as_i64().and_then(Rgb::from_wire),
            "background" => update.background = value.as_i64().and_then(Rgb::from_wire),
            "bold" => update.bold = value.as_bool(),
            "italic" => update.italic = value.as_bool(),
            "underline" => update.underline = value.as_bool(),
            "reverse" => update.reverse = value.as_bool(),
            _ => {}
        }
    }
    Some(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn batch(name: &str, tuples: Vec<Vec<Value>>) -> Value {
        let mut items = vec![Value::from(name)];
        items.extend(tuples.into_iter().map(Value::Array));
        Value::Array(items)
    }

    #[test]
    fn test_every_put_tuple_becomes_an_operation() {
        let ops = decode_batch(vec![batch(
            "put",
            vec![
                vec![Value::from("a")],
                vec![Value::from("b")],
                vec![Value::Binary(b"c".to_vec())],
            ],
        )]);
        assert_eq!(
            ops,
            vec![
                RedrawOp::Put("a".into()),
                RedrawOp::Put("b".into()),
                RedrawOp::Put("c".into()),
            ]
        );
    }

    #[test]
    fn test_batch_order_is_preserved() {
        let ops = decode_batch(vec![
            batch("cursor_goto", vec![vec![Value::from(2), Value::from(5)]]),
            batch(
                "highlight_set",
                vec![vec![Value::Map(vec![
                    (Value::from("foreground"), Value::from(0xFF0000)),
                    (Value::from("bold"), Value::from(true)),
                ])]],
            ),
            batch("put", vec![vec![Value::from("x")]]),
            batch("eol_clear", vec![vec![]]),
        ]);
        assert_eq!(
            ops,
            vec![
                RedrawOp::CursorGoto { row: 2, col: 5 },
                RedrawOp::HighlightSet(HighlightUpdate {
                    foreground: Some(Rgb(0xFF0000)),
                    bold: Some(true),
                    ..Default::default()
                }),
                RedrawOp::Put("x".into()),
                RedrawOp::EolClear,
            ]
        );
    }

    #[test]
    fn test_highlight_keys_as_raw_bytes() {
        let ops = decode_batch(vec![batch(
            "highlight_set",
            vec![vec![Value::Map(vec![
                (Value::Binary(b"background".to_vec()), Value::from(0x00FF00)),
                (Value::Binary(b"italic".to_vec()), Value::from(true)),
                (Value::Binary(vec![0xff, 0xfe]), Value::from(true)),
            ])]],
        )]);
        assert_eq!(
            ops,
            vec![RedrawOp::HighlightSet(HighlightUpdate {
                background: Some(Rgb(0x00FF00)),
                italic: Some(true),
                ..Default::default()
            })]
        );
    }

    #[test]
    fn test_unknown_operations_are_skipped() {
        let ops = decode_batch(vec![
            batch("hl_attr_define", vec![vec![Value::from(1)]]),
            batch("clear", vec![vec![]]),
        ]);
        assert_eq!(ops, vec![RedrawOp::Clear]);
    }

    #[test]
    fn test_resize_is_width_then_height() {
        let ops = decode_batch(vec![batch(
            "resize",
            vec![vec![Value::from(120), Value::from(40)]],
        )]);
        assert_eq!(ops, vec![RedrawOp::Resize { rows: 40, cols: 120 }]);
    }

    #[test]
    fn test_scroll_region_and_scroll() {
        let ops = decode_batch(vec![
            batch(
                "set_scroll_region",
                vec![vec![
                    Value::from(0),
                    Value::from(22),
                    Value::from(0),
                    Value::from(79),
                ]],
            ),
            batch("scroll", vec![vec![Value::from(-2)]]),
        ]);
        assert_eq!(
            ops,
            vec![
                RedrawOp::SetScrollRegion {
                    top: 0,
                    bottom: 22,
                    left: 0,
                    right: 79
                },
                RedrawOp::Scroll(-2),
            ]
        );
    }

    #[test]
    fn test_default_colour_updates() {
        let ops = decode_batch(vec![
            batch("update_fg", vec![vec![Value::from(0x112233)]]),
            batch("update_bg", vec![vec![Value::from(-1)]]),
        ]);
        assert_eq!(
            ops,
            vec![
                RedrawOp::SetForeground(Some(Rgb(0x112233))),
                RedrawOp::SetBackground(None),
            ]
        );
    }

    #[test]
    fn test_mode_and_flag_operations() {
        let ops = decode_batch(vec![
            batch("mode_change", vec![vec![Value::from("insert")]]),
            batch("normal_mode", vec![vec![]]),
            batch("busy_start", vec![vec![]]),
            batch("mouse_off", vec![vec![]]),
            batch("set_title", vec![vec![Value::from("[No Name] - NVIM")]]),
        ]);
        assert_eq!(
            ops,
            vec![
                RedrawOp::ModeChange("insert".into()),
                RedrawOp::ModeChange("normal".into()),
                RedrawOp::Busy(true),
                RedrawOp::Mouse(false),
                RedrawOp::SetTitle("[No Name] - NVIM".into()),
            ]
        );
    }

    #[test]
    fn test_malformed_tuple_does_not_stop_batch() {
        let ops = decode_batch(vec![
            batch(
                "cursor_goto",
                vec![vec![Value::from("row")], vec![Value::from(1), Value::from(1)]],
            ),
            Value::from("garbage"),
            batch("clear", vec![vec![]]),
        ]);
        assert_eq!(
            ops,
            vec![RedrawOp::CursorGoto { row: 1, col: 1 }, RedrawOp::Clear]
        );
    }

    #[test]
    fn test_rgb_channels() {
        let c = Rgb(0x102030);
        assert_eq!((c.r(), c.g(), c.b()), (0x10, 0x20, 0x30));
    }
}
