use std::{cell::RefCell, collections::HashMap, path::PathBuf, rc::Rc, time::Duration};

use async_std::channel;
use zbus::{fdo, zvariant::OwnedValue};

use crate::{
	args::*,
	config::Config,
	error::ShowError,
	overlay::GtkBackend,
	stack::*,
	style::*,
	types::*,
};

pub const BUS_NAME: &str = "org.keikoku.Alerts";
pub const OBJECT_PATH: &str = "/org/keikoku/Alerts";

#[derive(Debug)]
enum Command<D> {
	Show(ShowRequest<D>, channel::Sender<AlertId>),
	Close(AlertId, Duration),
	CloseAll(Duration),
	Visible(channel::Sender<Vec<AlertId>>),
	DefaultStyle(channel::Sender<AlertStyle>),
	SetDefaultStyle(StyleOverride, channel::Sender<AlertStyle>),
}

#[derive(Debug)]
struct AlertServer {
	sender: glib::Sender<Command<i32>>,
}

impl AlertServer {
	fn send(&self, cmd: Command<i32>) {
		if self.sender.send(cmd).is_err() {
			log::warn!("alert loop is gone");
		}
	}

	async fn call<T>(&self, cmd: impl FnOnce(channel::Sender<T>) -> Command<i32>) -> fdo::Result<T> {
		let (tx, rx) = channel::bounded(1);
		self.send(cmd(tx));
		rx.recv().await.map_err(|_| fdo::Error::Failed("alert loop is gone".to_owned()))
	}

	async fn show_request(&self, request: Result<ShowRequest<i32>, ShowError>) -> fdo::Result<String> {
		let request = request?;
		let id = self.call(|reply| Command::Show(request, reply)).await?;
		Ok(id.to_string())
	}
}

#[zbus::dbus_interface(name = "org.keikoku.Alerts")]
impl AlertServer {
	async fn show(&self, message: String, args: Vec<OwnedValue>) -> fdo::Result<String> {
		self.show_request(request(AlertText::Plain(message), None, &args, 2)).await
	}

	async fn show_markup(&self, markup: String, args: Vec<OwnedValue>) -> fdo::Result<String> {
		self.show_request(request(markup_text(markup), None, &args, 2)).await
	}

	async fn show_with_image(&self, message: String, image: String, args: Vec<OwnedValue>) -> fdo::Result<String> {
		let image = Some(PathBuf::from(image)).filter(|a| !a.as_os_str().is_empty());
		self.show_request(request(AlertText::Plain(message), image, &args, 3)).await
	}

	async fn close_specific(&self, id: String, fade: f64) {
		if let Ok(id) = id.parse() {
			self.send(Command::Close(id, fade_secs(fade)));
		}
	}

	async fn close(&self, id: String) {
		if let Ok(id) = id.parse() {
			self.send(Command::Close(id, DEFAULT_FADE_OUT));
		}
	}

	async fn close_all(&self, fade: f64) {
		self.send(Command::CloseAll(fade_secs(fade)));
	}

	async fn dismiss_all(&self) {
		self.send(Command::CloseAll(DEFAULT_FADE_OUT));
	}

	async fn visible(&self) -> fdo::Result<Vec<String>> {
		let ids = self.call(Command::Visible).await?;
		Ok(ids.iter().map(|a| a.to_string()).collect())
	}

	async fn default_style(&self) -> fdo::Result<HashMap<String, OwnedValue>> {
		let style = self.call(Command::DefaultStyle).await?;
		Ok(style_to_dict(&style))
	}

	/// Merges `style` into the default style and returns the previous one.
	async fn set_default_style(&self, style: HashMap<String, OwnedValue>) -> fdo::Result<HashMap<String, OwnedValue>> {
		let over = style_from_dict(&style);
		let previous = self.call(|reply| Command::SetDefaultStyle(over, reply)).await?;
		Ok(style_to_dict(&previous))
	}

	#[dbus_interface(signal)]
	async fn alert_closed(&self, ctx: &zbus::SignalContext<'_>, id: &str, reason: u32) -> zbus::Result<()>;
}

fn request(text: AlertText, image: Option<PathBuf>, args: &[OwnedValue], first: usize) -> Result<ShowRequest<i32>, ShowError> {
	let ShowArgs { style, display, lifetime } = parse_show_args(args, first)?;
	Ok(ShowRequest { image, style, display, lifetime, ..ShowRequest::new(text) })
}

/// Markup that Pango can't parse is shown as it is.
fn markup_text(markup: String) -> AlertText {
	match gtk::pango::parse_markup(&markup, '\0') {
		Ok(_) => AlertText::Rich(RichText::from_markup(markup)),
		Err(e) => {
			log::warn!("showing invalid markup as text: {}", e);
			AlertText::Plain(markup)
		}
	}
}

fn reply<T>(tx: &channel::Sender<T>, value: T) {
	if tx.try_send(value).is_err() {
		log::warn!("caller went away before the reply");
	}
}

fn handle<B: Backend>(stack: &mut AlertStack<B>, cmd: Command<B::Display>, closed: &impl Fn(AlertId, CloseReason)) {
	match cmd {
		Command::Show(request, tx) => {
			reply(&tx, stack.show(request));
			log::debug!("{} alerts up", stack.len());
		}
		Command::Close(id, fade) => {
			if stack.close_specific(id, fade) {
				closed(id, CloseReason::Closed);
			}
		}
		Command::CloseAll(fade) => {
			for id in stack.close_all(fade) {
				closed(id, CloseReason::Closed);
			}
		}
		Command::Visible(tx) => reply(&tx, stack.visible()),
		Command::DefaultStyle(tx) => reply(&tx, stack.default_style().clone()),
		Command::SetDefaultStyle(over, tx) => {
			let style = stack.default_style().merged(&over);
			reply(&tx, stack.set_default_style(style));
		}
	}
}

pub async fn main(config: Config) -> Result<(), Box<dyn std::error::Error>> {
	let main_context = glib::MainContext::default();
	let _context = main_context.acquire()?;
	gtk::init()?;

	let (command_tx, command_rx) = glib::MainContext::channel::<Command<i32>>(glib::PRIORITY_DEFAULT);
	let (expired_tx, expired_rx) = glib::MainContext::channel::<AlertId>(glib::PRIORITY_DEFAULT);
	let (closed_tx, closed_rx) = glib::MainContext::channel::<(AlertId, CloseReason)>(glib::PRIORITY_DEFAULT);
	let server = AlertServer { sender: command_tx };

	let conn = zbus::ConnectionBuilder::session()?
		.name(BUS_NAME)?
		.serve_at(OBJECT_PATH, server)?
		.build().await?;
	log::info!("serving {} at {}", BUS_NAME, OBJECT_PATH);

	closed_rx.attach(Some(&main_context), move |(id, reason)| {
		let conn = conn.clone();
		gidle_future::spawn(async move {
			let server_ref = match conn.object_server().interface::<_, AlertServer>(OBJECT_PATH).await {
				Ok(a) => a,
				Err(e) => return log::warn!("no alert interface: {}", e),
			};
			let server = server_ref.get().await;
			let ctx = server_ref.signal_context();
			if let Err(e) = server.alert_closed(ctx, &id.to_string(), reason as u32).await {
				log::warn!("could not signal closing of {}: {}", id, e);
			}
		});
		glib::Continue(true)
	});

	let closed = move |id: AlertId, reason: CloseReason| {
		if closed_tx.send((id, reason)).is_err() {
			log::warn!("close of {} not signalled", id);
		}
	};

	let stack = AlertStack::new(GtkBackend::new(expired_tx), config.default_style())
		.with_default_duration(config.default_duration());
	let stack = Rc::new(RefCell::new(stack));
	let stack2 = stack.clone();
	let closed = Rc::new(closed);
	let closed2 = closed.clone();

	expired_rx.attach(Some(&main_context), move |id| {
		if stack.borrow_mut().expire(id) {
			closed(id, CloseReason::Expired);
		}
		glib::Continue(true)
	});

	command_rx.attach(Some(&main_context), move |cmd| {
		handle(&mut *stack2.borrow_mut(), cmd, &*closed2);
		glib::Continue(true)
	});

	gtk::main();
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::stack::tests::FakeBackend;

	fn stack() -> AlertStack<FakeBackend> {
		AlertStack::new(FakeBackend::default(), AlertStyle::default())
	}

	fn show(stack: &mut AlertStack<FakeBackend>, text: &str, closed: &impl Fn(AlertId, CloseReason)) -> AlertId {
		let (tx, rx) = channel::bounded(1);
		handle(stack, Command::Show(ShowRequest::new(text), tx), closed);
		rx.try_recv().unwrap()
	}

	#[test]
	fn close_commands_report_what_closed() {
		let log = RefCell::new(Vec::new());
		let closed = |id: AlertId, reason: CloseReason| log.borrow_mut().push((id, reason));
		let mut stack = stack();
		let a = show(&mut stack, "a", &closed);
		let b = show(&mut stack, "b", &closed);
		let c = show(&mut stack, "c", &closed);

		handle(&mut stack, Command::Close(b, DEFAULT_FADE_OUT), &closed);
		handle(&mut stack, Command::Close(b, DEFAULT_FADE_OUT), &closed);
		handle(&mut stack, Command::CloseAll(Duration::ZERO), &closed);

		assert!(stack.is_empty());
		assert_eq!(*log.borrow(), vec![
			(b, CloseReason::Closed),
			(c, CloseReason::Closed),
			(a, CloseReason::Closed),
		]);
	}

	#[test]
	fn visible_lists_in_creation_order() {
		let closed = |_: AlertId, _: CloseReason| ();
		let mut stack = stack();
		let a = show(&mut stack, "a", &closed);
		let b = show(&mut stack, "b", &closed);
		let (tx, rx) = channel::bounded(1);
		handle(&mut stack, Command::Visible(tx), &closed);
		assert_eq!(rx.try_recv().unwrap(), vec![a, b]);
	}

	#[test]
	fn set_default_style_merges_and_returns_previous() {
		let closed = |_: AlertId, _: CloseReason| ();
		let mut stack = stack();
		let (tx, rx) = channel::bounded(1);
		let over = StyleOverride { radius: Some(4.), ..Default::default() };
		handle(&mut stack, Command::SetDefaultStyle(over, tx), &closed);
		assert_eq!(rx.try_recv().unwrap(), AlertStyle::default());
		assert_eq!(stack.default_style().radius, 4.);
		assert_eq!(stack.default_style().text_size, AlertStyle::default().text_size);

		let (tx, rx) = channel::bounded(1);
		handle(&mut stack, Command::DefaultStyle(tx), &closed);
		assert_eq!(rx.try_recv().unwrap().radius, 4.);
	}

	#[test]
	fn request_counts_positions_after_the_image() {
		let args = [OwnedValue::from(zbus::zvariant::Value::from(1.)), OwnedValue::from(zbus::zvariant::Value::from(2.))];
		let err = request(AlertText::from("x"), Some("a.png".into()), &args, 3).unwrap_err();
		assert_eq!(err.to_string(), "unexpected argument at position 4 of type 'd'");
	}

	#[test]
	fn bad_markup_falls_back_to_text() {
		assert_eq!(markup_text("<b>ok</b>".into()), AlertText::Rich(RichText::from_markup("<b>ok</b>")));
		assert_eq!(markup_text("<b>unclosed".into()), AlertText::Plain("<b>unclosed".into()));
	}
}
