use std::{cell::Cell, f64::consts::PI, path::Path, rc::Rc, time::{Duration, Instant}};

use gtk::{cairo, gdk, prelude::*};

use crate::{style::*, types::*};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const FALLBACK_SCREEN: Rect = Rect::new(0., 0., 1280., 720.);

macro_rules! build {
	($var:ident @ $name:ty { $($key:ident: $val:expr),* $(,)? }; $($init:tt)*) => {{
		let $var = build!($name { $($key: $val),* });
		{ $($init)* }
		$var
	}};
	($name:ty { $($key:ident: $val:expr),* $(,)? }) => {
		<$name>::builder()
			.visible(true)
			$(.$key($val))*
			.build()
	};
}

/// One click-through, always-on-top window.
pub struct Overlay {
	win: gtk::Window,
	// Bumped on every fade so an older fade stops touching the opacity
	generation: Rc<Cell<u32>>,
}

impl Overlay {
	fn new(frame: Rect) -> Overlay {
		let win = build!(gtk::Window {
			visible: false,
			type_hint: gdk::WindowTypeHint::Notification,
			decorated: false,
			app_paintable: true,
			accept_focus: false,
			skip_taskbar_hint: true,
			resizable: false,
		});
		win.set_visual(win.screen().and_then(|s| s.rgba_visual()).as_ref());
		win.connect_realize(|win| if let Some(w) = win.window() { w.set_override_redirect(true) });
		win.connect_map(|win| if let Some(w) = win.window() {
			w.input_shape_combine_region(&cairo::Region::create(), 0, 0);
		});
		win.set_size_request(frame.width.ceil() as i32, frame.height.ceil() as i32);
		win.move_(frame.x.round() as i32, frame.y.round() as i32);
		Overlay { win, generation: Default::default() }
	}

	fn transparent(self) -> Overlay {
		self.win.connect_draw(|_, cr| {
			if let Err(e) = clear(cr) {
				log::warn!("could not clear overlay: {}", e);
			}
			gtk::Inhibit(false)
		});
		self
	}

	fn fade(&self, to: f64, over: Duration, done: impl FnOnce(&gtk::Window) + 'static) {
		let generation = self.generation.get().wrapping_add(1);
		self.generation.set(generation);
		if over.is_zero() {
			self.win.set_opacity(to);
			done(&self.win);
			return;
		}

		let from = self.win.opacity();
		let start = Instant::now();
		let win = self.win.clone();
		let current = self.generation.clone();
		let mut done = Some(done);
		glib::timeout_add_local(FRAME_INTERVAL, move || {
			if current.get() != generation {
				return glib::Continue(false);
			}
			let t = (start.elapsed().as_secs_f64() / over.as_secs_f64()).min(1.);
			win.set_opacity(from + (to - from) * t);
			if t < 1. {
				return glib::Continue(true);
			}
			if let Some(done) = done.take() {
				done(&win);
			}
			glib::Continue(false)
		});
	}
}

impl Layer for Overlay {
	fn show(&self, fade: Duration) {
		self.win.set_opacity(0.);
		self.win.show_all();
		if let Some(w) = self.win.window() {
			w.raise();
		}
		self.fade(1., fade, |_| ());
	}

	fn fade_out(self, fade: Duration) {
		self.fade(0., fade, |win| unsafe { win.destroy() });
	}
}

fn clear(cr: &cairo::Context) -> Result<(), cairo::Error> {
	cr.set_operator(cairo::Operator::Source);
	cr.set_source_rgba(0., 0., 0., 0.);
	cr.paint()?;
	cr.set_operator(cairo::Operator::Over);
	Ok(())
}

fn paint_background(cr: &cairo::Context, width: f64, height: f64, style: &AlertStyle) -> Result<(), cairo::Error> {
	clear(cr)?;
	let inset = style.stroke_width / 2.;
	let (w, h) = (width - style.stroke_width, height - style.stroke_width);
	let r = style.radius.min(w / 2.).min(h / 2.).max(0.);

	cr.new_sub_path();
	cr.arc(inset + w - r, inset + r, r, -PI / 2., 0.);
	cr.arc(inset + w - r, inset + h - r, r, 0., PI / 2.);
	cr.arc(inset + r, inset + h - r, r, PI / 2., PI);
	cr.arc(inset + r, inset + r, r, PI, 3. * PI / 2.);
	cr.close_path();

	let Color { red, green, blue, alpha } = style.fill_color;
	cr.set_source_rgba(red, green, blue, alpha);
	cr.fill_preserve()?;
	let Color { red, green, blue, alpha } = style.stroke_color;
	cr.set_source_rgba(red, green, blue, alpha);
	cr.set_line_width(style.stroke_width);
	cr.stroke()
}

pub struct ExpiryTimer(Option<glib::SourceId>);

impl Timer for ExpiryTimer {
	fn cancel(&mut self) {
		if let Some(a) = self.0.take() { a.remove(); }
	}
}

/// The active window's monitor, else the pointer's, else the primary one.
fn focused_monitor<M>(
	active_window: Option<M>,
	pointer: impl FnOnce() -> Option<M>,
	primary: impl FnOnce() -> Option<M>,
) -> Option<M> {
	active_window.or_else(pointer).or_else(primary)
}

/// Draws alerts as override-redirect GTK windows.
pub struct GtkBackend {
	measurer: gtk::Label,
	expired: glib::Sender<AlertId>,
}

impl GtkBackend {
	pub fn new(expired: glib::Sender<AlertId>) -> GtkBackend {
		GtkBackend {
			measurer: gtk::Label::new(None),
			expired,
		}
	}

	fn monitor_index(display: &gdk::Display, monitor: &gdk::Monitor) -> Option<i32> {
		(0..display.n_monitors()).find(|i| display.monitor(*i).as_ref() == Some(monitor))
	}
}

impl Backend for GtkBackend {
	type Display = i32;
	type Layer = Overlay;
	type Timer = ExpiryTimer;

	fn focused_display(&self) -> i32 {
		let Some(display) = gdk::Display::default() else { return 0 };
		let active = gdk::Screen::default()
			.and_then(|screen| screen.active_window())
			.and_then(|win| display.monitor_at_window(&win));
		let pointer = || display.default_seat()
			.and_then(|seat| seat.pointer())
			.and_then(|pointer| {
				let (_, x, y) = pointer.position();
				display.monitor_at_point(x, y)
			});
		focused_monitor(active, pointer, || display.primary_monitor())
			.and_then(|m| Self::monitor_index(&display, &m))
			.unwrap_or(0)
	}

	fn resolve_display(&self, index: Option<i32>) -> i32 {
		match index {
			Some(i) if i >= 0 && gdk::Display::default().and_then(|d| d.monitor(i)).is_some() => i,
			Some(i) => {
				log::warn!("no display {}, using the focused one", i);
				self.focused_display()
			}
			None => self.focused_display(),
		}
	}

	fn usable_frame(&self, index: &i32) -> Rect {
		let monitor = gdk::Display::default().and_then(|display| {
			display.monitor(*index).or_else(|| {
				log::warn!("display {} went away, using the primary one", index);
				display.primary_monitor().or_else(|| display.monitor(0))
			})
		});
		match monitor {
			Some(m) => {
				let r = m.workarea();
				Rect::new(r.x() as f64, r.y() as f64, r.width() as f64, r.height() as f64)
			}
			None => {
				log::warn!("no monitors, assuming {:?}", FALLBACK_SCREEN);
				FALLBACK_SCREEN
			}
		}
	}

	fn measure(&self, text: &RichText) -> Size {
		let layout = self.measurer.create_pango_layout(None);
		layout.set_markup(text.as_markup());
		let (width, height) = layout.pixel_size();
		Size { width: width as f64, height: height as f64 }
	}

	fn draw_background(&mut self, _: &i32, frame: Rect, style: &AlertStyle) -> Overlay {
		let overlay = Overlay::new(frame);
		let style = style.clone();
		overlay.win.connect_draw(move |win, cr| {
			let (w, h) = (win.allocated_width() as f64, win.allocated_height() as f64);
			if let Err(e) = paint_background(cr, w, h, &style) {
				log::warn!("could not paint alert: {}", e);
			}
			gtk::Inhibit(false)
		});
		overlay
	}

	fn draw_text(&mut self, _: &i32, frame: Rect, text: &RichText, above: &Overlay) -> Overlay {
		let overlay = Overlay::new(frame).transparent();
		overlay.win.set_transient_for(Some(&above.win));
		overlay.win.add(&build!(
			a@gtk::Label { xalign: 0., yalign: 0. };
			a.set_markup(text.as_markup());
		));
		overlay
	}

	fn draw_image(&mut self, _: &i32, frame: Rect, path: &Path, above: &Overlay) -> Option<Overlay> {
		let side = frame.width.min(frame.height).round() as i32;
		let pixbuf = gdk_pixbuf::Pixbuf::from_file_at_scale(path, side, side, true)
			.map_err(|e| log::warn!("{}: {}", path.display(), e))
			.ok()?;
		let overlay = Overlay::new(frame).transparent();
		overlay.win.set_transient_for(Some(&above.win));
		overlay.win.add(&gtk::Image::from_pixbuf(Some(&pixbuf)));
		Some(overlay)
	}

	fn schedule_expiry(&mut self, id: AlertId, after: Duration) -> ExpiryTimer {
		let expired = self.expired.clone();
		ExpiryTimer(Some(glib::timeout_add_local(after, move || {
			if expired.send(id).is_err() {
				log::warn!("expiry for {} dropped", id);
			}
			glib::Continue(true)
			// It'll be removed when the alert is closed.
			// Removing it here causes a panic because it's already gone when it's cancelled.
		})))
	}

	fn fresh_id(&mut self) -> AlertId {
		AlertId::new_v4()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn active_window_decides_the_focused_monitor() {
		assert_eq!(focused_monitor(Some(2), || Some(1), || Some(0)), Some(2));
	}

	#[test]
	fn pointer_then_primary_when_nothing_is_active() {
		assert_eq!(focused_monitor(None, || Some(1), || Some(0)), Some(1));
		assert_eq!(focused_monitor(None, || None, || Some(0)), Some(0));
		assert_eq!(focused_monitor::<i32>(None, || None, || None), None);
	}
}
