//! A minimal debug renderer for a [`Cell`] (spec §9's glossary entry for
//! `mold`/`form`: "the text-dialect molder/former pair is out of scope for
//! this crate — panics and diagnostics render cells with a debug-only
//! textual dump instead").
//!
//! This is not the real molder: no load-round-trip guarantee, no
//! `form`/`mold` distinction, no per-datatype custom dialect hooks. It
//! exists so `RuntimeError` messages and test failures can show a cell as
//! something readable rather than `{:?}`. Grounded in the teacher's SON
//! dumper (`son.rs`'s `value_to_son`/`format_value`): a single recursive
//! match over the value's shape, writing straight into a `String` buffer.

use std::fmt::Write;

use crate::cell::{Cell, Immediate, Kind, Payload, SeriesKind, WordKind};
use crate::interpreter::Interpreter;

/// Render `cell` to a debug string. Never fails: an inaccessible series or
/// unbound word renders as a placeholder rather than propagating an error,
/// since this only ever runs to build a diagnostic message.
pub fn mold(interp: &Interpreter, cell: &Cell) -> String {
    let mut buf = String::new();
    mold_into(interp, cell, &mut buf);
    buf
}

fn mold_into(interp: &Interpreter, cell: &Cell, buf: &mut String) {
    if cell.is_end() {
        buf.push_str("<end>");
        return;
    }
    if cell.is_void() {
        buf.push_str("<void>");
        return;
    }

    match cell.payload() {
        Payload::End | Payload::Void => unreachable!("handled above"),
        Payload::Immediate(imm) => mold_immediate(imm, buf),
        Payload::Word(w) => {
            let text = interp.symbols.text(w.symbol);
            match w.kind {
                WordKind::Word => buf.push_str(text),
                WordKind::SetWord => {
                    buf.push_str(text);
                    buf.push(':');
                }
                WordKind::GetWord => {
                    buf.push(':');
                    buf.push_str(text);
                }
                WordKind::LitWord => {
                    buf.push('\'');
                    buf.push_str(text);
                }
                WordKind::Refinement => {
                    buf.push('/');
                    buf.push_str(text);
                }
                WordKind::Issue => {
                    buf.push('#');
                    buf.push_str(text);
                }
            }
        }
        Payload::Series(s) => mold_series(interp, s.kind, s.series, buf),
        Payload::Context(c) => {
            let _ = write!(buf, "make {:?}! [...]", c.kind);
        }
        Payload::Func(f) => {
            let _ = write!(buf, "<function:{:?}>", f.kind);
        }
        Payload::Datatype(d) => {
            let _ = write!(buf, "{:?}!", d.of_kind);
        }
        Payload::Typeset(t) => {
            let name = t.symbol.map(|s| interp.symbols.text(s).to_string());
            match name {
                Some(n) => buf.push_str(&n),
                None => buf.push_str("<typeset>"),
            }
        }
        Payload::Varargs(_) => buf.push_str("<varargs>"),
    }
}

fn mold_immediate(imm: &Immediate, buf: &mut String) {
    match imm {
        Immediate::Blank => buf.push('_'),
        Immediate::Bar => buf.push('|'),
        Immediate::LitBar => buf.push_str("'|"),
        Immediate::Logic(b) => buf.push_str(if *b { "true" } else { "false" }),
        Immediate::Integer(n) => {
            let _ = write!(buf, "{n}");
        }
        Immediate::Decimal(f) => {
            let s = f.to_string();
            buf.push_str(&s);
            if !s.contains('.') && f.is_finite() {
                buf.push_str(".0");
            }
        }
        Immediate::Percent(f) => {
            let _ = write!(buf, "{}%", f * 100.0);
        }
        Immediate::Money(cents) => {
            let _ = write!(buf, "${}.{:02}", cents / 100, (cents % 100).abs());
        }
        Immediate::Char(c) => {
            let _ = write!(buf, "#\"{c}\"");
        }
        Immediate::Pair(x, y) => {
            let _ = write!(buf, "{x}x{y}");
        }
        Immediate::Tuple(bytes) => {
            let parts: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
            buf.push_str(&parts.join("."));
        }
        Immediate::Time(nanos) => {
            let _ = write!(buf, "{nanos}:00");
        }
        Immediate::Date { ymd, .. } => {
            let _ = write!(buf, "{ymd}-date");
        }
        Immediate::Handle(h) => {
            let _ = write!(buf, "<handle:{h:x}>");
        }
    }
}

fn mold_series(interp: &Interpreter, kind: SeriesKind, id: crate::ids::SeriesId, buf: &mut String) {
    let series = match interp.series.get(id) {
        Ok(s) => s,
        Err(_) => {
            buf.push_str("<inaccessible>");
            return;
        }
    };

    if kind == SeriesKind::Str || kind == SeriesKind::File || kind == SeriesKind::Email || kind == SeriesKind::Url
        || kind == SeriesKind::Tag
    {
        let text = match &series.data {
            crate::series::SeriesData::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            _ => String::new(),
        };
        match kind {
            SeriesKind::Str => mold_string(&text, buf),
            SeriesKind::Tag => {
                let _ = write!(buf, "<{text}>");
            }
            _ => buf.push_str(&text),
        }
        return;
    }

    if !kind.is_array_like() {
        let _ = write!(buf, "<{:?}!>", kind.kind());
        return;
    }

    let (open, close) = match kind.kind() {
        Kind::Block => ("[", "]"),
        Kind::Group => ("(", ")"),
        _ => ("", ""),
    };

    let cells = match series.cells() {
        Ok(c) => c.to_vec(),
        Err(_) => {
            buf.push_str("<inaccessible>");
            return;
        }
    };

    buf.push_str(open);
    let mut first = true;
    for c in &cells {
        if c.is_end() {
            break;
        }
        if !first {
            buf.push(' ');
        }
        first = false;
        mold_into(interp, c, buf);
    }
    buf.push_str(close);
}

fn mold_string(s: &str, buf: &mut String) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            c => buf.push(c),
        }
    }
    buf.push('"');
}
