/*
[INPUT]:  Dashboard configuration, transport events, operator input, shutdown token
[OUTPUT]: Running dashboard client with graceful teardown
[POS]:    Runner layer - single-threaded event loop wiring transport, controller and window
[UPDATE]: When changing startup order, event sources, or shutdown handling
*/

pub mod event;

use std::rc::Rc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tribeca_messaging::{ConnectionController, TransportEvent, WsTransport};

use crate::app::event::AppEvent;
use crate::config::DashboardConfig;
use crate::console::{self, ConsoleCommand, Flow};
use crate::window::MainWindow;

pub struct App {
    pub controller: ConnectionController,
    pub window: MainWindow,
    transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    input_rx: mpsc::UnboundedReceiver<AppEvent>,
    shutdown: CancellationToken,
    worker: Option<tokio::task::JoinHandle<()>>,
    should_exit: bool,
}

impl App {
    /// Connect to the server and mount the window.
    ///
    /// Must be called inside a [`tokio::task::LocalSet`].
    pub fn start(config: &DashboardConfig, shutdown: CancellationToken) -> Result<Self> {
        let (transport, transport_events, worker) = WsTransport::spawn(
            &config.server_url,
            config.reconnect.clone(),
            shutdown.child_token(),
        )
        .context("start websocket transport")?;

        let controller =
            ConnectionController::new(Rc::new(transport)).context("create connection controller")?;
        let window = MainWindow::mount(&controller, config)?;

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        spawn_stdin_reader(input_tx, shutdown.clone());

        Ok(Self {
            controller,
            window,
            transport_events,
            input_rx,
            shutdown,
            worker: Some(worker),
            should_exit: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("{}", console::HELP);

        while !self.should_exit {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => AppEvent::Shutdown,
                transport = self.transport_events.recv() => match transport {
                    Some(event) => AppEvent::Transport(event),
                    None => AppEvent::TransportStopped,
                },
                Some(input) = self.input_rx.recv() => input,
            };
            self.handle_event(event);
        }

        self.teardown().await
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Transport(event) => self.controller.handle_event(event),
            AppEvent::Input(line) => self.handle_line(&line),
            AppEvent::InputClosed => {
                debug!("stdin closed; console commands disabled");
            }
            AppEvent::TransportStopped => {
                warn!("transport worker stopped; exiting");
                self.should_exit = true;
            }
            AppEvent::Shutdown => {
                info!("shutdown requested");
                self.should_exit = true;
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err:#}");
                return;
            }
        };

        match console::execute(&self.window, command) {
            Ok((flow, output)) => {
                println!("{output}");
                if flow == Flow::Quit {
                    self.should_exit = true;
                }
            }
            Err(err) => println!("{err:#}"),
        }
    }

    async fn teardown(&mut self) -> Result<()> {
        self.window.destroy();

        self.shutdown.cancel();
        if let Some(worker) = self.worker.take() {
            worker.await.context("join transport worker")?;
        }
        info!("dashboard stopped");
        Ok(())
    }
}

fn spawn_stdin_reader(tx: mpsc::UnboundedSender<AppEvent>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => line,
            };
            let event = match line {
                Ok(Some(line)) => AppEvent::Input(line),
                Ok(None) => {
                    let _ = tx.send(AppEvent::InputClosed);
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "stdin read failed");
                    let _ = tx.send(AppEvent::InputClosed);
                    break;
                }
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    });
}
