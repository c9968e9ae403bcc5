use std::{fmt, time::Duration};

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
	pub red: f64,
	pub green: f64,
	pub blue: f64,
	pub alpha: f64,
}

impl Color {
	pub const fn white(white: f64, alpha: f64) -> Color {
		Color { red: white, green: white, blue: white, alpha }
	}

	fn channel(v: f64) -> u8 {
		(v.clamp(0., 1.) * 255.).round() as u8
	}

	/// `#rrggbb`, without alpha.
	pub fn rgb_hex(&self) -> String {
		format!("#{:02x}{:02x}{:02x}", Self::channel(self.red), Self::channel(self.green), Self::channel(self.blue))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}, expected #rrggbb or #rrggbbaa")]
pub struct ColorError(String);

impl std::str::FromStr for Color {
	type Err = ColorError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let err = || ColorError(s.to_owned());
		let hex = s.strip_prefix('#').ok_or_else(err)?;
		if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
			return Err(err());
		}
		let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map(|b| b as f64 / 255.).map_err(|_| err());
		Ok(Color {
			red: byte(0)?,
			green: byte(2)?,
			blue: byte(4)?,
			alpha: if hex.len() == 8 { byte(6)? } else { 1. },
		})
	}
}

impl fmt::Display for Color {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{:02x}", self.rgb_hex(), Self::channel(self.alpha))
	}
}

/// Reads an optional color, dropping values that aren't one instead of failing.
fn lenient_color<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Color>, D::Error> {
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Text(String),
		Other(serde::de::IgnoredAny),
	}

	Ok(match Raw::deserialize(d)? {
		Raw::Text(s) => s.parse().map_err(|e| log::warn!("ignoring color: {}", e)).ok(),
		Raw::Other(_) => {
			log::warn!("ignoring color that isn't a string");
			None
		}
	})
}

/// Rich-text attributes applied to plain messages.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TextStyle {
	pub font: Option<String>,
	pub size: Option<f64>,
	#[serde(deserialize_with = "lenient_color")]
	pub color: Option<Color>,
	pub weight: Option<String>,
	pub italic: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertStyle {
	pub stroke_width: f64,
	pub stroke_color: Color,
	pub fill_color: Color,
	pub radius: f64,
	pub text_color: Color,
	pub text_font: String,
	pub text_size: f64,
	/// Defaults to `text_size`.
	pub padding: Option<f64>,
	pub fade_in: Duration,
	pub text_style: Option<TextStyle>,
}

impl Default for AlertStyle {
	fn default() -> Self {
		AlertStyle {
			stroke_width: 2.,
			stroke_color: Color::white(1., 1.),
			fill_color: Color::white(0., 0.75),
			radius: 27.,
			text_color: Color::white(1., 1.),
			text_font: "Sans".to_owned(),
			text_size: 27.,
			padding: None,
			fade_in: Duration::from_millis(150),
			text_style: None,
		}
	}
}

/// Partial style; every field set here wins over the defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StyleOverride {
	pub stroke_width: Option<f64>,
	#[serde(deserialize_with = "lenient_color")]
	pub stroke_color: Option<Color>,
	#[serde(deserialize_with = "lenient_color")]
	pub fill_color: Option<Color>,
	pub radius: Option<f64>,
	#[serde(deserialize_with = "lenient_color")]
	pub text_color: Option<Color>,
	pub text_font: Option<String>,
	pub text_size: Option<f64>,
	pub padding: Option<f64>,
	pub fade_in_duration: Option<f64>,
	pub text_style: Option<TextStyle>,
}

impl AlertStyle {
	pub fn merged(&self, over: &StyleOverride) -> AlertStyle {
		let base = self.clone();
		AlertStyle {
			stroke_width: over.stroke_width.unwrap_or(base.stroke_width),
			stroke_color: over.stroke_color.unwrap_or(base.stroke_color),
			fill_color: over.fill_color.unwrap_or(base.fill_color),
			radius: over.radius.unwrap_or(base.radius),
			text_color: over.text_color.unwrap_or(base.text_color),
			text_font: over.text_font.clone().unwrap_or(base.text_font),
			text_size: over.text_size.unwrap_or(base.text_size),
			padding: over.padding.or(base.padding),
			fade_in: over.fade_in_duration
				.and_then(|a| Duration::try_from_secs_f64(a.max(0.)).ok())
				.unwrap_or(base.fade_in),
			text_style: over.text_style.clone().or(base.text_style),
		}
	}

	pub fn padding(&self) -> f64 {
		self.padding.unwrap_or(self.text_size)
	}

	/// Turns a message into the markup that gets drawn. Rich text keeps its own formatting.
	pub fn render(&self, text: AlertText) -> RichText {
		let plain = match text {
			AlertText::Rich(rich) => return rich,
			AlertText::Plain(plain) => plain,
		};
		let fallback = TextStyle::default();
		let ts = self.text_style.as_ref().unwrap_or(&fallback);
		RichText::styled(&plain, &Attributes {
			font: ts.font.as_deref().unwrap_or(&self.text_font),
			size: ts.size.unwrap_or(self.text_size),
			color: ts.color.unwrap_or(self.text_color),
			weight: ts.weight.as_deref(),
			italic: ts.italic.unwrap_or(false),
		})
	}
}

struct Attributes<'a> {
	font: &'a str,
	size: f64,
	color: Color,
	weight: Option<&'a str>,
	italic: bool,
}

/// Pango markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichText(String);

impl RichText {
	pub fn from_markup(markup: impl Into<String>) -> RichText {
		RichText(markup.into())
	}

	pub fn as_markup(&self) -> &str {
		&self.0
	}

	fn styled(text: &str, attrs: &Attributes) -> RichText {
		let esc = |s: &str| glib::markup_escape_text(s).to_string();
		let mut span = format!(
			r#"<span font_family="{}" size="{}" foreground="{}" fgalpha="{}%""#,
			esc(attrs.font),
			// Pango sizes are in 1024ths of a point
			(attrs.size.max(0.) * 1024.).round() as i64,
			attrs.color.rgb_hex(),
			((attrs.color.alpha.clamp(0., 1.) * 100.).round() as u8).max(1),
		);
		if let Some(weight) = attrs.weight {
			span += &format!(r#" weight="{}""#, esc(weight));
		}
		if attrs.italic {
			span += r#" style="italic""#;
		}
		RichText(format!("{}>{}</span>", span, esc(text)))
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertText {
	Plain(String),
	Rich(RichText),
}

impl From<&str> for AlertText {
	fn from(s: &str) -> Self {
		AlertText::Plain(s.to_owned())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn colors_parse_with_and_without_alpha() {
		let c: Color = "#ff000080".parse().unwrap();
		assert_eq!(c.red, 1.);
		assert_eq!(c.green, 0.);
		assert!((c.alpha - 128. / 255.).abs() < 1e-9);
		assert_eq!("#00ff00".parse::<Color>().unwrap().alpha, 1.);
		assert_eq!(c.to_string(), "#ff000080");
		assert!("red".parse::<Color>().is_err());
		assert!("#12345".parse::<Color>().is_err());
		assert!("#gg0000".parse::<Color>().is_err());
	}

	#[test]
	fn override_wins_key_by_key() {
		let style = AlertStyle::default().merged(&StyleOverride {
			text_size: Some(12.),
			fill_color: Some(Color::white(1., 1.)),
			..Default::default()
		});
		assert_eq!(style.text_size, 12.);
		assert_eq!(style.fill_color, Color::white(1., 1.));
		assert_eq!(style.radius, 27.);
		assert_eq!(style.text_font, "Sans");
		assert_eq!(style.padding(), 12.);
	}

	#[test]
	fn plain_text_uses_style_font() {
		let text = AlertStyle::default().render("a < b".into());
		assert_eq!(
			text.as_markup(),
			r##"<span font_family="Sans" size="27648" foreground="#ffffff" fgalpha="100%">a &lt; b</span>"##,
		);
	}

	#[test]
	fn text_style_fills_gaps_from_style() {
		let style = AlertStyle {
			text_style: Some(TextStyle {
				font: Some("Serif".into()),
				italic: Some(true),
				weight: Some("bold".into()),
				..Default::default()
			}),
			..Default::default()
		};
		let markup = style.render("hi".into());
		let markup = markup.as_markup();
		assert!(markup.contains(r#"font_family="Serif""#));
		assert!(markup.contains(r#"size="27648""#));
		assert!(markup.contains(r#"weight="bold""#));
		assert!(markup.contains(r#"style="italic""#));
	}

	#[test]
	fn rich_text_is_left_alone() {
		let rich = RichText::from_markup("<b>bold</b>");
		let style = AlertStyle { text_style: Some(TextStyle::default()), ..Default::default() };
		assert_eq!(style.render(AlertText::Rich(rich.clone())), rich);
	}
}
