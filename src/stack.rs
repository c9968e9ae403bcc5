use std::{mem, path::PathBuf, time::Duration};

use crate::{style::*, types::*};

/// Fade used when an alert expires, and by closes that don't name one.
pub const DEFAULT_FADE_OUT: Duration = Duration::from_millis(150);
pub const DEFAULT_DURATION: Duration = Duration::from_secs(2);

/// Gap between stacked alerts.
const STACK_GAP: f64 = 3.;
/// Text measurement comes out slightly short.
const MEASURE_FUDGE: f64 = 4.;

/// Clamps a fade given in seconds. Negative and NaN mean no fade at all.
pub fn fade_secs(secs: f64) -> Duration {
	if secs > 0. {
		Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
	} else {
		Duration::ZERO
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShowRequest<D> {
	pub text: AlertText,
	pub image: Option<PathBuf>,
	pub style: StyleOverride,
	pub display: Option<D>,
	/// `None` uses the stack's default duration.
	pub lifetime: Option<Lifetime>,
}

impl<D> ShowRequest<D> {
	pub fn new(text: impl Into<AlertText>) -> ShowRequest<D> {
		ShowRequest {
			text: text.into(),
			image: None,
			style: StyleOverride::default(),
			display: None,
			lifetime: None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
	pub frame: Rect,
	pub text: Rect,
	pub image: Option<Rect>,
}

/// Places an alert on `screen`, below `previous` if there is one.
pub fn layout(screen: Rect, previous: Option<Rect>, text: Size, style: &AlertStyle, with_image: bool) -> Layout {
	let padding = style.padding();
	let text_w = text.width + MEASURE_FUDGE;
	let text_h = text.height + MEASURE_FUDGE;
	let image_w = if with_image { text_h + padding / 2. } else { 0. };

	let width = text_w + image_w + padding;
	let height = text_h + padding;

	let mut y = screen.y + screen.height * (1. - 1. / 1.55) + 55.;
	if let Some(prev) = previous {
		y = prev.bottom() + STACK_GAP;
		if y + height > screen.bottom() {
			y = screen.y;
		}
	}

	let frame = Rect::new(screen.x + (screen.width - width) / 2., y, width, height);
	let inner_x = frame.x + padding / 2.;
	let inner_y = frame.y + padding / 2.;
	Layout {
		frame,
		text: Rect::new(inner_x + image_w, inner_y, text_w, text_h),
		image: with_image.then(|| Rect::new(inner_x, inner_y, text_h, text_h)),
	}
}

struct VisibleAlert<B: Backend> {
	id: AlertId,
	display: B::Display,
	frame: Rect,
	layers: Vec<B::Layer>,
	timer: Option<B::Timer>,
}

impl<B: Backend> VisibleAlert<B> {
	fn dismiss(self, fade: Duration) {
		if let Some(mut timer) = self.timer {
			timer.cancel();
		}
		for layer in self.layers.into_iter().rev() {
			layer.fade_out(fade);
		}
	}
}

/// The alerts currently on screen, oldest first.
pub struct AlertStack<B: Backend> {
	backend: B,
	default_style: AlertStyle,
	default_duration: Duration,
	alerts: Vec<VisibleAlert<B>>,
}

impl<B: Backend> AlertStack<B> {
	pub fn new(backend: B, default_style: AlertStyle) -> AlertStack<B> {
		AlertStack {
			backend,
			default_style,
			default_duration: DEFAULT_DURATION,
			alerts: Vec::new(),
		}
	}

	pub fn with_default_duration(mut self, duration: Duration) -> AlertStack<B> {
		self.default_duration = duration;
		self
	}

	pub fn default_style(&self) -> &AlertStyle {
		&self.default_style
	}

	/// Returns the style that was in effect before.
	pub fn set_default_style(&mut self, style: AlertStyle) -> AlertStyle {
		mem::replace(&mut self.default_style, style)
	}

	#[cfg(test)]
	pub fn backend(&self) -> &B {
		&self.backend
	}

	pub fn show(&mut self, request: ShowRequest<B::Display>) -> AlertId {
		let style = self.default_style.merged(&request.style);
		let text = style.render(request.text);
		let display = self.backend.resolve_display(request.display);
		let screen = self.backend.usable_frame(&display);
		let previous = self.alerts.iter().rev().find(|a| a.display == display).map(|a| a.frame);
		let size = self.backend.measure(&text);
		let layout = layout(screen, previous, size, &style, request.image.is_some());

		let background = self.backend.draw_background(&display, layout.frame, &style);
		background.show(style.fade_in);
		let text_layer = self.backend.draw_text(&display, layout.text, &text, &background);
		text_layer.show(style.fade_in);
		let mut layers = vec![background];
		if let (Some(path), Some(frame)) = (&request.image, layout.image) {
			match self.backend.draw_image(&display, frame, path, &layers[0]) {
				Some(image) => {
					image.show(style.fade_in);
					layers.push(image);
				}
				None => log::warn!("could not load alert image {}", path.display()),
			}
		}
		layers.push(text_layer);

		let mut id = self.backend.fresh_id();
		while self.contains(id) {
			id = self.backend.fresh_id();
		}

		let lifetime = request.lifetime.unwrap_or(Lifetime::For(self.default_duration));
		let timer = match lifetime {
			Lifetime::For(after) => Some(self.backend.schedule_expiry(id, after)),
			Lifetime::Persistent => None,
		};

		log::debug!("alert {} on {:?} at {:?}", id, display, layout.frame);
		self.alerts.push(VisibleAlert { id, display, frame: layout.frame, layers, timer });
		id
	}

	/// Returns whether anything was closed.
	pub fn close_specific(&mut self, id: AlertId, fade: Duration) -> bool {
		let Some(index) = self.alerts.iter().position(|a| a.id == id) else {
			return false;
		};
		log::debug!("closing alert {}", id);
		self.alerts.remove(index).dismiss(fade);
		true
	}

	/// Called when an expiry timer fires.
	pub fn expire(&mut self, id: AlertId) -> bool {
		self.close_specific(id, DEFAULT_FADE_OUT)
	}

	/// Closes everything, newest first, and returns what was closed.
	pub fn close_all(&mut self, fade: Duration) -> Vec<AlertId> {
		let mut closed = Vec::with_capacity(self.alerts.len());
		while let Some(id) = self.alerts.last().map(|a| a.id) {
			self.close_specific(id, fade);
			closed.push(id);
		}
		closed
	}

	pub fn contains(&self, id: AlertId) -> bool {
		self.alerts.iter().any(|a| a.id == id)
	}

	#[cfg(test)]
	pub fn frame(&self, id: AlertId) -> Option<Rect> {
		self.alerts.iter().find(|a| a.id == id).map(|a| a.frame)
	}

	pub fn visible(&self) -> Vec<AlertId> {
		self.alerts.iter().map(|a| a.id).collect()
	}

	pub fn len(&self) -> usize {
		self.alerts.len()
	}

	#[cfg(test)]
	pub fn is_empty(&self) -> bool {
		self.alerts.is_empty()
	}
}
