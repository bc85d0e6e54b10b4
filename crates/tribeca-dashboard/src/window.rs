/*
[INPUT]:  Product advertisements, application state, notepad and log topics; operator commands
[OUTPUT]: Derived main window view, command publications, per-pair view lifecycle
[POS]:    View controller - root UI component, owner of the per-connection reset
[UPDATE]: When the window gains state, commands, or reset rules change
*/

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Timelike, Utc};
use tracing::{debug, info, warn};
use tribeca_messaging::topics::{
    APPLICATION_STATE, CANCEL_ALL_ORDERS, CHANGE_NOTEPAD, CLEAN_ALL_CLOSED_ORDERS,
    CLEAN_ALL_ORDERS, MESSAGES, NOTEPAD, PRODUCT_ADVERTISEMENT,
};
use tribeca_messaging::{
    ApplicationState, CancelAllOrdersRequest, ChangeNotepadRequest, CleanAllClosedOrdersRequest,
    CleanAllOrdersRequest, ConnectionController, Notepad, ProductAdvertisement, Publisher,
    PublisherFactory, ResetReason, ScheduledTask, Scope, ServerMessage, SubscriptionFactory,
    schedule,
};

use crate::config::DashboardConfig;
use crate::order::DisplayOrder;
use crate::pair::{DisplayPair, PairView};
use crate::theme::{Theme, ThemeState};

const BASE_TITLE: &str = "tribeca";
const SIZE_UNITS: [&str; 6] = ["", "K", "M", "G", "T", "P"];

/// Human readable byte count with 1024-based units, e.g. `1.000GB`.
///
/// Values beyond the petabyte range are printed as raw bytes.
pub fn bytes_to_size(input: u64, precision: usize) -> String {
    if input == 0 {
        return "0B".to_string();
    }

    let mut index = 0usize;
    let mut scaled = input;
    while scaled >= 1024 {
        scaled /= 1024;
        index += 1;
    }
    if index >= SIZE_UNITS.len() {
        return format!("{input}B");
    }

    let value = input as f64 / 1024f64.powi(index as i32);
    format!("{value:.precision$}{}B", SIZE_UNITS[index])
}

/// Snapshot of everything the main window shows.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowView {
    pub connected: bool,
    pub title: String,
    pub pair_name: Option<String>,
    pub exch_name: Option<String>,
    pub memory: Option<String>,
    pub notepad: Option<String>,
    pub theme: Theme,
    pub messages: Vec<ServerMessage>,
    pub pair: Option<PairView>,
    /// Completed layout settle passes.
    pub layout_settles: u32,
}

#[derive(Debug, Default)]
struct WindowState {
    connected: bool,
    title: Option<String>,
    pair_name: Option<String>,
    exch_name: Option<String>,
    memory: Option<String>,
    notepad: Option<String>,
    theme: ThemeState,
    messages: VecDeque<ServerMessage>,
    layout_settles: u32,
}

type HourSource = Box<dyn Fn() -> u32>;

struct WindowInner {
    scope: Scope,
    subscriptions: SubscriptionFactory,
    publishers: PublisherFactory,
    settle_delay: Duration,
    message_log_limit: usize,
    clock: HourSource,
    state: Rc<RefCell<WindowState>>,
    pair: RefCell<Option<DisplayPair>>,
    order: RefCell<DisplayOrder>,
    settle: RefCell<Option<ScheduledTask>>,
    cancel_all: Publisher<CancelAllOrdersRequest>,
    clean_all: Publisher<CleanAllOrdersRequest>,
    clean_all_closed: Publisher<CleanAllClosedOrdersRequest>,
    change_notepad: Publisher<ChangeNotepadRequest>,
}

/// Root dashboard component.
///
/// Handlers hold only weak references to the window, so dropping the last
/// `MainWindow` handle tears everything down.
#[derive(Clone)]
pub struct MainWindow {
    inner: Rc<WindowInner>,
}

impl MainWindow {
    /// Mount the window against `controller`, reading the hour from the UTC clock.
    ///
    /// Must run inside a [`tokio::task::LocalSet`]; layout settles are local timers.
    pub fn mount(controller: &ConnectionController, config: &DashboardConfig) -> Result<Self> {
        Self::mount_with_clock(controller, config, || Utc::now().hour())
    }

    pub fn mount_with_clock(
        controller: &ConnectionController,
        config: &DashboardConfig,
        clock: impl Fn() -> u32 + 'static,
    ) -> Result<Self> {
        let scope = Scope::new("main-window");
        let subscriptions = controller.subscription_factory();
        let publishers = controller.publisher_factory();

        let inner = Rc::new(WindowInner {
            scope,
            order: RefCell::new(DisplayOrder::new(&publishers)),
            cancel_all: publishers.get_publisher(CANCEL_ALL_ORDERS),
            clean_all: publishers.get_publisher(CLEAN_ALL_ORDERS),
            clean_all_closed: publishers.get_publisher(CLEAN_ALL_CLOSED_ORDERS),
            change_notepad: publishers.get_publisher(CHANGE_NOTEPAD),
            subscriptions,
            publishers,
            settle_delay: config.settle_delay(),
            message_log_limit: config.message_log_limit,
            clock: Box::new(clock),
            state: Rc::new(RefCell::new(WindowState::default())),
            pair: RefCell::new(None),
            settle: RefCell::new(None),
        });

        inner.reset(ResetReason::Startup);
        Self::wire(&inner, controller).context("wire main window subscriptions")?;

        info!("main window mounted");
        Ok(Self { inner })
    }

    fn wire(inner: &Rc<WindowInner>, controller: &ConnectionController) -> Result<()> {
        let scope = &inner.scope;
        let factory = &inner.subscriptions;

        let (live, batch) = (Rc::downgrade(inner), Rc::downgrade(inner));
        factory
            .get_subscription(scope, PRODUCT_ADVERTISEMENT)?
            .on_message(move |advert| with_window(&live, |w| w.on_advert(advert)))
            .on_batch(move |adverts| {
                with_window(&batch, |w| adverts.iter().for_each(|a| w.on_advert(a)))
            });

        let (live, batch) = (Rc::downgrade(inner), Rc::downgrade(inner));
        factory
            .get_subscription(scope, APPLICATION_STATE)?
            .on_message(move |app| with_window(&live, |w| w.on_app_state(app)))
            .on_batch(move |apps| {
                with_window(&batch, |w| apps.iter().for_each(|a| w.on_app_state(a)))
            });

        let (live, batch) = (Rc::downgrade(inner), Rc::downgrade(inner));
        factory
            .get_subscription(scope, NOTEPAD)?
            .on_message(move |notepad| with_window(&live, |w| w.on_notepad(notepad)))
            .on_batch(move |notepads| {
                with_window(&batch, |w| notepads.iter().for_each(|n| w.on_notepad(n)))
            });

        let (live, batch) = (Rc::downgrade(inner), Rc::downgrade(inner));
        factory
            .get_subscription(scope, MESSAGES)?
            .on_message(move |message| with_window(&live, |w| w.push_message(message.clone())))
            .on_batch(move |messages| {
                with_window(&batch, |w| w.replace_messages(messages))
            });

        let weak = Rc::downgrade(inner);
        controller.on_reset(scope, move |reason| with_window(&weak, |w| w.reset(reason)));
        Ok(())
    }

    pub fn view(&self) -> WindowView {
        let pair = self.inner.pair.borrow().as_ref().map(DisplayPair::view);
        let state = self.inner.state.borrow();
        WindowView {
            connected: state.connected,
            title: state.title.clone().unwrap_or_else(|| BASE_TITLE.to_string()),
            pair_name: state.pair_name.clone(),
            exch_name: state.exch_name.clone(),
            memory: state.memory.clone(),
            notepad: state.notepad.clone(),
            theme: state.theme.current(),
            messages: state.messages.iter().cloned().collect(),
            pair,
            layout_settles: state.layout_settles,
        }
    }

    pub fn has_pair(&self) -> bool {
        self.inner.pair.borrow().is_some()
    }

    /// Clear all per-connection state. Safe to call repeatedly.
    pub fn reset(&self, reason: ResetReason) {
        self.inner.reset(reason);
    }

    pub fn cancel_all_orders(&self) -> bool {
        self.inner.cancel_all.send(&CancelAllOrdersRequest::default())
    }

    pub fn clean_all_orders(&self) -> bool {
        self.inner.clean_all.send(&CleanAllOrdersRequest::default())
    }

    pub fn clean_all_closed_orders(&self) -> bool {
        self.inner
            .clean_all_closed
            .send(&CleanAllClosedOrdersRequest::default())
    }

    pub fn change_notepad(&self, content: impl Into<String>) -> bool {
        self.inner.change_notepad.send(&ChangeNotepadRequest {
            content: content.into(),
        })
    }

    /// Flip day/night and pin it as the user's choice.
    pub fn change_theme(&self) -> Theme {
        let theme = self.inner.state.borrow_mut().theme.toggle();
        info!(%theme, "theme changed by user");
        self.inner.schedule_settle();
        theme
    }

    /// Edit the order ticket.
    pub fn edit_order<R>(&self, edit: impl FnOnce(&mut DisplayOrder) -> R) -> R {
        edit(&mut self.inner.order.borrow_mut())
    }

    pub fn submit_order(&self) -> Result<bool> {
        let order = self.inner.order.borrow().clone();
        order.submit()
    }

    /// Toggle quoting for the advertised pair. `None` when no pair is shown.
    pub fn toggle_active(&self) -> Option<bool> {
        self.inner.pair.borrow().as_ref().map(DisplayPair::toggle_active)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.scope.is_destroyed()
    }

    /// Tear down every subscription, timer and hook the window owns.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            return;
        }
        self.inner.reset(ResetReason::Teardown);
        self.inner.scope.destroy();
        info!("main window destroyed");
    }
}

impl std::fmt::Debug for MainWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainWindow")
            .field("view", &self.view())
            .finish()
    }
}

fn with_window(weak: &Weak<WindowInner>, f: impl FnOnce(&WindowInner)) {
    if let Some(inner) = weak.upgrade() {
        f(&inner);
    }
}

impl WindowInner {
    fn on_advert(&self, advert: &ProductAdvertisement) {
        let pair_name = advert.pair.to_string();
        let hour = (self.clock)();
        {
            let mut state = self.state.borrow_mut();
            state.connected = true;
            state.title = Some(format!("{BASE_TITLE} [{}]", advert.environment));
            state.theme.apply_hour(hour);
            state.pair_name = Some(pair_name.clone());
            state.exch_name = Some(advert.exchange.to_string());
        }
        info!(
            exchange = %advert.exchange,
            pair = %pair_name,
            environment = %advert.environment,
            "product advertisement"
        );

        self.dispose_pair();
        match DisplayPair::new(&self.scope, pair_name, &self.subscriptions, &self.publishers) {
            Ok(pair) => *self.pair.borrow_mut() = Some(pair),
            Err(err) => warn!(error = %err, "failed to create pair view"),
        }

        self.schedule_settle();
    }

    fn on_app_state(&self, app: &ApplicationState) {
        let mut state = self.state.borrow_mut();
        state.memory = Some(bytes_to_size(app.memory, 3));
        if state.theme.apply_hour(app.hour) {
            debug!(hour = app.hour, theme = %state.theme.current(), "theme follows server hour");
        }
    }

    fn on_notepad(&self, notepad: &Notepad) {
        self.state.borrow_mut().notepad = Some(notepad.content.clone());
    }

    fn push_message(&self, message: ServerMessage) {
        let mut state = self.state.borrow_mut();
        state.messages.push_back(message);
        while state.messages.len() > self.message_log_limit {
            state.messages.pop_front();
        }
    }

    fn replace_messages(&self, messages: &[ServerMessage]) {
        let skip = messages.len().saturating_sub(self.message_log_limit);
        let mut state = self.state.borrow_mut();
        state.messages = messages.iter().skip(skip).cloned().collect();
    }

    fn reset(&self, reason: ResetReason) {
        debug!(%reason, "main window reset");
        {
            let mut state = self.state.borrow_mut();
            state.connected = false;
            state.pair_name = None;
            state.exch_name = None;
        }
        self.dispose_pair();
    }

    fn dispose_pair(&self) {
        let previous = self.pair.borrow_mut().take();
        if let Some(pair) = previous {
            pair.dispose();
        }
    }

    /// Debounced layout pass after the window content changed shape.
    fn schedule_settle(&self) {
        if self.scope.is_destroyed() {
            return;
        }
        if let Some(pending) = self.settle.borrow_mut().take() {
            pending.cancel();
        }

        let state = Rc::downgrade(&self.state);
        let task = schedule(&self.scope, self.settle_delay, move || {
            if let Some(state) = state.upgrade() {
                let mut state = state.borrow_mut();
                state.layout_settles += 1;
                debug!(settles = state.layout_settles, "layout settled");
            }
        });
        *self.settle.borrow_mut() = Some(task);
    }
}
