/*
[INPUT]:  Operator input lines from stdin
[OUTPUT]: Parsed console commands executed against the main window, styled status output
[POS]:    Operator surface - text stand-in for the window's buttons and forms
[UPDATE]: When adding console commands or changing their syntax
*/

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use console::style;
use rust_decimal::Decimal;
use tribeca_messaging::{OrderType, Side, TimeInForce};

use crate::theme::Theme;
use crate::window::{MainWindow, WindowView};

pub const HELP: &str = "\
commands:
  cancel-all                               cancel all open orders
  clean-all                                remove all orders from the blotter
  clean-closed                             remove closed orders from the blotter
  notepad <text>                           replace the shared notepad
  order <side> <price> <qty> [tif] [type]  submit a manual order
  theme                                    toggle day/night theme
  active                                   toggle quoting for the advertised pair
  status                                   print the window state
  help                                     show this help
  quit                                     exit";

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTicket {
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub time_in_force: Option<TimeInForce>,
    pub order_type: Option<OrderType>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    CancelAll,
    CleanAll,
    CleanClosed,
    Notepad(String),
    Order(OrderTicket),
    Theme,
    Active,
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "cancel-all" => ConsoleCommand::CancelAll,
            "clean-all" => ConsoleCommand::CleanAll,
            "clean-closed" => ConsoleCommand::CleanClosed,
            "notepad" => ConsoleCommand::Notepad(rest.to_string()),
            "order" => ConsoleCommand::Order(parse_order(rest)?),
            "theme" => ConsoleCommand::Theme,
            "active" => ConsoleCommand::Active,
            "status" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            "" => bail!("empty command"),
            other => bail!("unknown command `{other}`"),
        };
        Ok(command)
    }
}

fn parse_order(args: &str) -> Result<OrderTicket> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if !(3..=5).contains(&parts.len()) {
        bail!("usage: order <side> <price> <qty> [tif] [type]");
    }

    let side = parts[0].parse::<Side>()?;
    let price = Decimal::from_str(parts[1]).with_context(|| format!("invalid price `{}`", parts[1]))?;
    let quantity =
        Decimal::from_str(parts[2]).with_context(|| format!("invalid quantity `{}`", parts[2]))?;
    let time_in_force = parts.get(3).map(|s| s.parse::<TimeInForce>()).transpose()?;
    let order_type = parts.get(4).map(|s| s.parse::<OrderType>()).transpose()?;

    Ok(OrderTicket {
        side,
        price,
        quantity,
        time_in_force,
        order_type,
    })
}

/// What the runner should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Apply `command` to `window` and return the line to print.
pub fn execute(window: &MainWindow, command: ConsoleCommand) -> Result<(Flow, String)> {
    let output = match command {
        ConsoleCommand::CancelAll => sent("cancel all orders", window.cancel_all_orders()),
        ConsoleCommand::CleanAll => sent("clean all orders", window.clean_all_orders()),
        ConsoleCommand::CleanClosed => {
            sent("clean closed orders", window.clean_all_closed_orders())
        }
        ConsoleCommand::Notepad(content) => sent("notepad update", window.change_notepad(content)),
        ConsoleCommand::Order(ticket) => {
            window.edit_order(|order| {
                order.side = ticket.side;
                order.price = Some(ticket.price);
                order.quantity = Some(ticket.quantity);
                if let Some(tif) = ticket.time_in_force {
                    order.time_in_force = tif;
                }
                if let Some(order_type) = ticket.order_type {
                    order.order_type = order_type;
                }
            });
            sent("order", window.submit_order()?)
        }
        ConsoleCommand::Theme => format!("theme is now {}", window.change_theme()),
        ConsoleCommand::Active => {
            let sent_ok = window
                .toggle_active()
                .ok_or_else(|| anyhow!("no pair advertised yet"))?;
            sent("quoting toggle", sent_ok)
        }
        ConsoleCommand::Status => render_status(&window.view()),
        ConsoleCommand::Help => HELP.to_string(),
        ConsoleCommand::Quit => return Ok((Flow::Quit, "bye".to_string())),
    };
    Ok((Flow::Continue, output))
}

fn sent(what: &str, delivered: bool) -> String {
    if delivered {
        format!("{} {what}", style("sent").green())
    } else {
        format!("{} {what} (not connected)", style("dropped").yellow())
    }
}

struct Field<'a>(&'a Option<String>);

impl fmt::Display for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => f.write_str(value),
            None => f.write_str("-"),
        }
    }
}

/// Multi-line summary of the window for the `status` command.
pub fn render_status(view: &WindowView) -> String {
    let connection = if view.connected {
        style("connected").green().bold()
    } else {
        style("disconnected").red().bold()
    };
    let theme = match view.theme {
        Theme::Dark => style(view.theme.as_str()).magenta(),
        Theme::Light => style(view.theme.as_str()).yellow(),
    };
    let quoting = match view.pair.as_ref().and_then(|pair| pair.active) {
        Some(true) => "on",
        Some(false) => "off",
        None => "-",
    };

    let mut out = format!(
        "{}  {connection}\n  exchange: {}\n  pair:     {}\n  quoting:  {quoting}\n  memory:   {}\n  theme:    {theme}\n  notepad:  {}",
        style(&view.title).cyan().bold(),
        Field(&view.exch_name),
        Field(&view.pair_name),
        Field(&view.memory),
        Field(&view.notepad),
    );
    if let Some(last) = view.messages.last() {
        out.push_str(&format!(
            "\n  last msg: [{}] {}",
            last.time.format("%H:%M:%S"),
            last.text
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cancel-all", ConsoleCommand::CancelAll)]
    #[case("  CLEAN-ALL ", ConsoleCommand::CleanAll)]
    #[case("clean-closed", ConsoleCommand::CleanClosed)]
    #[case("theme", ConsoleCommand::Theme)]
    #[case("active", ConsoleCommand::Active)]
    #[case("status", ConsoleCommand::Status)]
    #[case("?", ConsoleCommand::Help)]
    #[case("exit", ConsoleCommand::Quit)]
    fn test_parse_simple_commands(#[case] line: &str, #[case] expected: ConsoleCommand) {
        assert_eq!(line.parse::<ConsoleCommand>().unwrap(), expected);
    }

    #[test]
    fn test_parse_notepad_keeps_text() {
        let command: ConsoleCommand = "notepad  widen   quotes before close".parse().unwrap();
        assert_eq!(
            command,
            ConsoleCommand::Notepad("widen   quotes before close".into())
        );
    }

    #[test]
    fn test_parse_order_with_defaults() {
        let command: ConsoleCommand = "order ask 101.5 0.25".parse().unwrap();
        assert_eq!(
            command,
            ConsoleCommand::Order(OrderTicket {
                side: Side::Ask,
                price: Decimal::from_str("101.5").unwrap(),
                quantity: Decimal::from_str("0.25").unwrap(),
                time_in_force: None,
                order_type: None,
            })
        );
    }

    #[test]
    fn test_parse_order_with_all_fields() {
        let command: ConsoleCommand = "order bid 100 1 ioc market".parse().unwrap();
        let ConsoleCommand::Order(ticket) = command else {
            panic!("Expected order command");
        };
        assert_eq!(ticket.time_in_force, Some(TimeInForce::Ioc));
        assert_eq!(ticket.order_type, Some(OrderType::Market));
    }

    #[rstest]
    #[case("")]
    #[case("launch")]
    #[case("order bid")]
    #[case("order hold 1 1")]
    #[case("order bid abc 1")]
    #[case("order bid 1 1 day")]
    fn test_parse_rejects_bad_input(#[case] line: &str) {
        assert!(line.parse::<ConsoleCommand>().is_err());
    }
}
