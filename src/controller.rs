use std::sync::Arc;
use std::time::Duration;

use arboard::Clipboard;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{error, trace};

use crate::client::{HistoryLoader, HistorySource};
use crate::credentials::BearerToken;
use crate::domain::{AppError, Effect, HistoryConfig, InputField, Message};
use crate::model::Model;

pub struct Controller<S> {
    event_poll_time: u64,
    loader: Arc<HistoryLoader<S>>,
    runtime: Handle,
    sender: UnboundedSender<Message>,
    receiver: UnboundedReceiver<Message>,
    in_flight: Option<JoinHandle<()>>,
    clipboard: Option<Clipboard>,
}

impl<S: HistorySource + 'static> Controller<S> {
    pub fn new(cfg: &HistoryConfig, loader: HistoryLoader<S>, runtime: Handle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            event_poll_time: cfg.event_poll_time,
            loader: Arc::new(loader),
            runtime,
            sender,
            receiver,
            in_flight: None,
            clipboard: None,
        }
    }

    /// Next message for the model: finished loads first, then terminal events.
    pub fn handle_event(&mut self, model: &Model) -> Result<Option<Message>, AppError> {
        if let Ok(message) = self.receiver.try_recv() {
            self.in_flight = None;
            return Ok(Some(message));
        }

        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                // crossterm also reports release and repeat events on Windows
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    return Ok(self.handle_key(model, key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, model: &Model, key: KeyEvent) -> Option<Message> {
        let message = if model.raw_keyevents() {
            Some(Message::RawKey(key))
        } else {
            map_key(key)
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }

    pub fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::Fetch(token) => self.fetch(token),
            Effect::CopyToClipboard(text) => self.copy_to_clipboard(text),
            Effect::Navigate(url) => trace!("Navigation to {url} is handled by the caller"),
        }
    }

    /// Spawns the load; its result comes back through [`Controller::handle_event`].
    fn fetch(&mut self, token: BearerToken) {
        if self.in_flight.is_some() {
            trace!("Fetch already running");
            return;
        }
        let loader = Arc::clone(&self.loader);
        let sender = self.sender.clone();
        self.in_flight = Some(self.runtime.spawn(async move {
            let result = loader.load(&token).await;
            if sender.send(Message::Loaded(result)).is_err() {
                trace!("View closed before the load finished");
            }
        }));
    }

    /// Awaits the running load. Used when there is no terminal to poll.
    pub fn wait_for_load(&mut self) -> Option<Message> {
        self.in_flight = None;
        self.runtime.block_on(self.receiver.recv())
    }

    // Opened on first use, a headless session never needs one.
    fn copy_to_clipboard(&mut self, text: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    error!("Clipboard unavailable: {e:?}");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(text) {
                Ok(_) => trace!("Copied row to clipboard."),
                Err(e) => error!("Error copying to clipboard: {e:?}"),
            }
        }
    }

    pub fn abort(&mut self) {
        if let Some(task) = self.in_flight.take() {
            trace!("Aborting in-flight load");
            task.abort();
        }
    }
}

/// Key bindings of the table view.
pub fn map_key(key: KeyEvent) -> Option<Message> {
    match (key.code, key.modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
        (KeyCode::Char('q'), _) => Some(Message::Quit),
        (KeyCode::Char('/'), _) => Some(Message::Focus(InputField::Search)),
        (KeyCode::Char('c'), _) => Some(Message::Focus(InputField::DateCreated)),
        (KeyCode::Char('d'), _) => Some(Message::Focus(InputField::DateCompleted)),
        (KeyCode::Char('f'), _) => Some(Message::ApplyFilters),
        (KeyCode::Char('x'), _) => Some(Message::ClearFilters),
        (KeyCode::Char('r'), _) => Some(Message::Load),
        (KeyCode::Char('n'), _) => Some(Message::NewRequest),
        (KeyCode::Char('y'), _) => Some(Message::CopyRow),
        (KeyCode::Char('?'), _) => Some(Message::Help),
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(Message::MoveDown),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(Message::MoveUp),
        (KeyCode::PageDown, _) => Some(Message::MovePageDown),
        (KeyCode::PageUp, _) => Some(Message::MovePageUp),
        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(Message::MoveBeginning),
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(Message::MoveEnd),
        (KeyCode::Esc, _) => Some(Message::Exit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_filter_controls() {
        assert!(matches!(
            map_key(KeyEvent::from(KeyCode::Char('/'))),
            Some(Message::Focus(InputField::Search))
        ));
        assert!(matches!(
            map_key(KeyEvent::from(KeyCode::Char('c'))),
            Some(Message::Focus(InputField::DateCreated))
        ));
        assert!(matches!(
            map_key(KeyEvent::from(KeyCode::Char('d'))),
            Some(Message::Focus(InputField::DateCompleted))
        ));
        assert!(matches!(
            map_key(KeyEvent::from(KeyCode::Char('f'))),
            Some(Message::ApplyFilters)
        ));
        assert!(matches!(
            map_key(KeyEvent::from(KeyCode::Char('n'))),
            Some(Message::NewRequest)
        ));
    }

    #[test]
    fn ctrl_c_quits_instead_of_focusing() {
        assert!(matches!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Message::Quit)
        ));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        assert!(map_key(KeyEvent::from(KeyCode::Char('z'))).is_none());
    }
}
