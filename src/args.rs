use std::collections::HashMap;

use zbus::zvariant::{OwnedValue, Value};

use crate::{error::ShowError, style::*, types::Lifetime};

pub const DISPLAY_PATH: &str = "/org/keikoku/Display/";

/// The optional slots after a message: style, display, duration, in that order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ShowArgs {
	pub style: StyleOverride,
	pub display: Option<i32>,
	pub lifetime: Option<Lifetime>,
}

/// Looks through variants wrapped in variants.
fn inner<'a, 'b>(v: &'a Value<'b>) -> &'a Value<'b> {
	match v {
		Value::Value(v) => inner(v),
		v => v,
	}
}

fn number(v: &Value) -> Option<f64> {
	Some(match inner(v) {
		Value::F64(a) => *a,
		Value::U8(a) => *a as f64,
		Value::I16(a) => *a as f64,
		Value::U16(a) => *a as f64,
		Value::I32(a) => *a as f64,
		Value::U32(a) => *a as f64,
		Value::I64(a) => *a as f64,
		Value::U64(a) => *a as f64,
		_ => return None,
	})
}

fn string(v: &Value) -> Option<String> {
	match inner(v) {
		Value::Str(s) => Some(s.as_str().to_owned()),
		_ => None,
	}
}

fn boolean(v: &Value) -> Option<bool> {
	match inner(v) {
		Value::Bool(b) => Some(*b),
		_ => None,
	}
}

fn as_dict(v: &Value) -> Option<HashMap<String, OwnedValue>> {
	match inner(v) {
		v @ Value::Dict(_) => HashMap::<String, OwnedValue>::try_from(v.clone())
			.map_err(|e| log::warn!("ignoring style dictionary: {}", e))
			.ok(),
		_ => None,
	}
}

/// `first` is the position of `args[0]`; the message itself is position 1.
pub fn parse_show_args(args: &[OwnedValue], first: usize) -> Result<ShowArgs, ShowError> {
	let mut out = ShowArgs::default();
	let mut rest = args.iter().enumerate().peekable();

	if let Some((_, v)) = rest.next_if(|(_, v)| matches!(inner(v), Value::Dict(_))) {
		out.style = as_dict(v).map(|d| style_from_dict(&d)).unwrap_or_default();
	}

	if let Some((_, v)) = rest.next_if(|(_, v)| matches!(inner(v), Value::ObjectPath(_))) {
		if let Value::ObjectPath(path) = inner(v) {
			out.display = path.as_str().strip_prefix(DISPLAY_PATH).and_then(|n| n.parse().ok());
			if out.display.is_none() {
				log::warn!("unknown display {}, using the focused one", path.as_str());
			}
		}
	}

	// Anything that isn't a number keeps the alert up until it's closed
	if let Some((_, v)) = rest.next() {
		out.lifetime = Some(number(v).map_or(Lifetime::Persistent, Lifetime::from_secs));
	}

	if let Some((i, v)) = rest.next() {
		return Err(ShowError::UnexpectedArgument {
			position: first + i,
			signature: inner(v).value_signature().as_str().to_owned(),
		});
	}

	Ok(out)
}

fn color(dict: &HashMap<String, OwnedValue>, key: &str) -> Option<Color> {
	let s = dict.get(key).and_then(|v| string(v))?;
	s.parse().map_err(|e| log::warn!("ignoring {}: {}", key, e)).ok()
}

fn text_style_from_dict(dict: &HashMap<String, OwnedValue>) -> TextStyle {
	TextStyle {
		font: dict.get("font").and_then(|v| string(v)),
		size: dict.get("size").and_then(|v| number(v)),
		color: color(dict, "color"),
		weight: dict.get("weight").and_then(|v| string(v)),
		italic: dict.get("italic").and_then(|v| boolean(v)),
	}
}

/// Unknown keys and values of the wrong type are ignored.
pub fn style_from_dict(dict: &HashMap<String, OwnedValue>) -> StyleOverride {
	let num = |k: &str| dict.get(k).and_then(|v| number(v));
	StyleOverride {
		stroke_width: num("stroke_width"),
		stroke_color: color(dict, "stroke_color"),
		fill_color: color(dict, "fill_color"),
		radius: num("radius"),
		text_color: color(dict, "text_color"),
		text_font: dict.get("text_font").and_then(|v| string(v)),
		text_size: num("text_size"),
		padding: num("padding"),
		fade_in_duration: num("fade_in_duration"),
		text_style: dict.get("text_style").and_then(|v| as_dict(v)).map(|d| text_style_from_dict(&d)),
	}
}

fn text_style_values(ts: &TextStyle) -> HashMap<String, Value<'static>> {
	let mut out = HashMap::new();
	if let Some(font) = &ts.font {
		out.insert("font".to_owned(), Value::from(font.clone()));
	}
	if let Some(size) = ts.size {
		out.insert("size".to_owned(), Value::from(size));
	}
	if let Some(color) = ts.color {
		out.insert("color".to_owned(), Value::from(color.to_string()));
	}
	if let Some(weight) = &ts.weight {
		out.insert("weight".to_owned(), Value::from(weight.clone()));
	}
	if let Some(italic) = ts.italic {
		out.insert("italic".to_owned(), Value::from(italic));
	}
	out
}

/// Inverse of [`style_from_dict`].
pub fn style_to_dict(style: &AlertStyle) -> HashMap<String, OwnedValue> {
	let mut out: HashMap<String, Value<'static>> = HashMap::new();
	out.insert("stroke_width".to_owned(), style.stroke_width.into());
	out.insert("stroke_color".to_owned(), style.stroke_color.to_string().into());
	out.insert("fill_color".to_owned(), style.fill_color.to_string().into());
	out.insert("radius".to_owned(), style.radius.into());
	out.insert("text_color".to_owned(), style.text_color.to_string().into());
	out.insert("text_font".to_owned(), style.text_font.clone().into());
	out.insert("text_size".to_owned(), style.text_size.into());
	if let Some(padding) = style.padding {
		out.insert("padding".to_owned(), padding.into());
	}
	out.insert("fade_in_duration".to_owned(), style.fade_in.as_secs_f64().into());
	if let Some(ts) = &style.text_style {
		out.insert("text_style".to_owned(), Value::from(text_style_values(ts)));
	}
	out.into_iter().map(|(k, v)| (k, OwnedValue::from(v))).collect()
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use zbus::zvariant::ObjectPath;

	use super::*;

	fn ov<'a>(v: impl Into<Value<'a>>) -> OwnedValue {
		OwnedValue::from(v.into())
	}

	fn style_arg(pairs: &[(&str, Value<'static>)]) -> OwnedValue {
		let map: HashMap<String, Value<'static>> = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
		ov(map)
	}

	fn display_arg(n: i32) -> OwnedValue {
		let path = format!("{}{}", DISPLAY_PATH, n);
		ov(ObjectPath::try_from(path).unwrap())
	}

	#[test]
	fn no_args_means_defaults() {
		assert_eq!(parse_show_args(&[], 2).unwrap(), ShowArgs::default());
	}

	#[test]
	fn all_slots_in_order() {
		let args = [style_arg(&[("text_size", Value::from(12.))]), display_arg(1), ov(0.5)];
		let parsed = parse_show_args(&args, 2).unwrap();
		assert_eq!(parsed.style.text_size, Some(12.));
		assert_eq!(parsed.display, Some(1));
		assert_eq!(parsed.lifetime, Some(Lifetime::For(Duration::from_millis(500))));
	}

	#[test]
	fn slots_can_be_skipped() {
		let parsed = parse_show_args(&[ov(3u32)], 2).unwrap();
		assert_eq!(parsed.lifetime, Some(Lifetime::For(Duration::from_secs(3))));
		assert_eq!(parsed.display, None);

		let parsed = parse_show_args(&[display_arg(0)], 2).unwrap();
		assert_eq!(parsed.display, Some(0));
		assert_eq!(parsed.lifetime, None);
	}

	#[test]
	fn non_numeric_duration_is_persistent() {
		let parsed = parse_show_args(&[ov("forever")], 2).unwrap();
		assert_eq!(parsed.lifetime, Some(Lifetime::Persistent));
		let parsed = parse_show_args(&[ov(true)], 2).unwrap();
		assert_eq!(parsed.lifetime, Some(Lifetime::Persistent));
	}

	#[test]
	fn extra_argument_names_position_and_type() {
		let args = [display_arg(0), ov(1.), ov("extra")];
		let err = parse_show_args(&args, 2).unwrap_err();
		let ShowError::UnexpectedArgument { position, signature } = &err;
		assert_eq!(*position, 4);
		assert_eq!(signature, "s");
		assert_eq!(err.to_string(), "unexpected argument at position 4 of type 's'");
	}

	#[test]
	fn misplaced_style_is_an_error() {
		// once the duration slot is filled there's nowhere left for a style
		let args = [ov(1.), style_arg(&[])];
		let err = parse_show_args(&args, 3).unwrap_err();
		let ShowError::UnexpectedArgument { position, signature } = err;
		assert_eq!(position, 4);
		assert_eq!(signature, "a{sv}");
	}

	#[test]
	fn unknown_display_path_falls_back() {
		let args = [ov(ObjectPath::try_from("/somewhere/else").unwrap())];
		assert_eq!(parse_show_args(&args, 2).unwrap().display, None);
	}

	#[test]
	fn bad_style_values_are_ignored() {
		let args = [style_arg(&[
			("radius", Value::from("round")),
			("fill_color", Value::from("#00000080")),
			("stroke_color", Value::from("blue")),
			("bogus", Value::from(1.)),
		])];
		let style = parse_show_args(&args, 2).unwrap().style;
		assert_eq!(style.radius, None);
		assert_eq!(style.stroke_color, None);
		assert_eq!(style.fill_color, Some("#00000080".parse().unwrap()));
	}

	#[test]
	fn nested_text_style() {
		let mut nested = HashMap::new();
		nested.insert("font".to_owned(), Value::from("Serif"));
		nested.insert("italic".to_owned(), Value::from(true));
		let args = [style_arg(&[("text_style", Value::from(nested))])];
		let ts = parse_show_args(&args, 2).unwrap().style.text_style.unwrap();
		assert_eq!(ts.font.as_deref(), Some("Serif"));
		assert_eq!(ts.italic, Some(true));
		assert_eq!(ts.size, None);
	}

	#[test]
	fn style_dict_survives_the_trip() {
		let style = AlertStyle {
			fill_color: "#000000bf".parse().unwrap(),
			padding: Some(8.),
			fade_in: Duration::from_millis(500),
			text_style: Some(TextStyle { weight: Some("bold".into()), ..Default::default() }),
			..Default::default()
		};
		let back = AlertStyle::default().merged(&style_from_dict(&style_to_dict(&style)));
		assert_eq!(back, style);
	}
}
