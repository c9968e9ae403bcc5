use std::{fmt, path::Path, str::FromStr, time::Duration};

use crate::style::{AlertStyle, RichText};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
}

impl Rect {
	pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Rect {
		Rect { x, y, width, height }
	}

	pub fn bottom(&self) -> f64 {
		self.y + self.height
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
	pub width: f64,
	pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlertId(uuid::Uuid);

impl AlertId {
	pub fn new_v4() -> AlertId {
		AlertId(uuid::Uuid::new_v4())
	}
}

impl fmt::Display for AlertId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

impl FromStr for AlertId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		uuid::Uuid::parse_str(s).map(AlertId)
	}
}

/// How long an alert stays up before it closes itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lifetime {
	For(Duration),
	Persistent,
}

impl Lifetime {
	/// Negative seconds expire immediately; NaN and anything too large never expire.
	pub fn from_secs(secs: f64) -> Lifetime {
		if secs.is_nan() {
			return Lifetime::Persistent;
		}
		Duration::try_from_secs_f64(secs.max(0.)).map_or(Lifetime::Persistent, Lifetime::For)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
	Expired = 1,
	Closed = 3,
}

/// Visual object owned by one alert.
pub trait Layer {
	fn show(&self, fade: Duration);
	/// Fades the layer out, releasing it once the fade is done.
	fn fade_out(self, fade: Duration);
}

/// Pending expiry. Cancelling twice is fine.
pub trait Timer {
	fn cancel(&mut self);
}

/// Everything the alert stack needs from the desktop it runs on.
pub trait Backend {
	type Display: Clone + PartialEq + fmt::Debug;
	type Layer: Layer;
	type Timer: Timer;

	fn focused_display(&self) -> Self::Display;
	/// The display an alert actually lands on. Missing or unknown displays
	/// become the focused one, so stacking sees the same display as drawing.
	fn resolve_display(&self, display: Option<Self::Display>) -> Self::Display {
		display.unwrap_or_else(|| self.focused_display())
	}
	fn usable_frame(&self, display: &Self::Display) -> Rect;
	fn measure(&self, text: &RichText) -> Size;

	fn draw_background(&mut self, display: &Self::Display, frame: Rect, style: &AlertStyle) -> Self::Layer;
	fn draw_text(&mut self, display: &Self::Display, frame: Rect, text: &RichText, above: &Self::Layer) -> Self::Layer;
	/// `None` when the image can't be loaded.
	fn draw_image(&mut self, display: &Self::Display, frame: Rect, path: &Path, above: &Self::Layer) -> Option<Self::Layer>;

	fn schedule_expiry(&mut self, id: AlertId, after: Duration) -> Self::Timer;
	fn fresh_id(&mut self) -> AlertId;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lifetime_clamps_negative_and_rejects_non_finite() {
		assert_eq!(Lifetime::from_secs(-1.), Lifetime::For(Duration::ZERO));
		assert_eq!(Lifetime::from_secs(0.5), Lifetime::For(Duration::from_millis(500)));
		assert_eq!(Lifetime::from_secs(f64::NAN), Lifetime::Persistent);
		assert_eq!(Lifetime::from_secs(f64::INFINITY), Lifetime::Persistent);
		assert_eq!(Lifetime::from_secs(1e30), Lifetime::Persistent);
	}

	#[test]
	fn alert_id_parses_its_own_display() {
		let id = AlertId::new_v4();
		assert_eq!(id.to_string().parse::<AlertId>().unwrap(), id);
		assert!("not-an-id".parse::<AlertId>().is_err());
	}
}
