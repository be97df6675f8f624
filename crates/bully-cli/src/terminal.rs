//! Colored terminal output for dashboard views

use bully_monitor::render::{leader_change_notice, THIS_NODE_LABEL};
use bully_monitor::{
    ConnectionState, DashboardSink, DashboardView, LeaderChangeEvent, ObserverPanel, RoleBadge,
    RosterBody,
};
use colored::*;

/// Prints every rendered view to stdout
pub struct TerminalSink {
    clear_screen: bool,
}

impl TerminalSink {
    pub fn new(clear_screen: bool) -> Self {
        Self { clear_screen }
    }
}

impl DashboardSink for TerminalSink {
    fn render(&mut self, view: &DashboardView) {
        if self.clear_screen {
            print!("\x1B[2J\x1B[1;1H"); // Clear screen
        }
        print_view(view);
    }

    fn notify(&mut self, event: &LeaderChangeEvent) {
        println!("{}", format!("👑 {}", leader_change_notice(event)).cyan().bold());
    }
}

pub fn print_view(view: &DashboardView) {
    println!("{}", "Bully Cluster Monitor".cyan().bold());
    println!("{}", "=====================".cyan());
    println!("Push channel: {}", connection_label(view.connection));
    println!();

    match &view.observer {
        ObserverPanel::Waiting => println!("{}", "Waiting for node status...".dimmed()),
        ObserverPanel::Ready {
            node_id,
            role,
            leader,
            heartbeat,
        } => {
            let badge = match role {
                RoleBadge::Leader => role.label().green().bold(),
                RoleBadge::Follower => role.label().blue().bold(),
            };
            println!("Node:           {} [{}]", node_id.as_str().bold(), badge);
            println!("Current leader: {}", leader);
            println!("Last heartbeat: {}", heartbeat);
        }
    }
    println!();

    match &view.roster.header {
        Some(header) => println!("{} {}", "Cluster:".bold(), header),
        None => println!("{}", "Cluster:".bold()),
    }
    match &view.roster.body {
        RosterBody::Loading => println!("  {}", "loading cluster status...".dimmed()),
        RosterBody::Empty => println!("  {}", "no nodes reported".yellow()),
        RosterBody::Cards(cards) => {
            for card in cards {
                let label = if card.is_leader() {
                    card.label.green().bold()
                } else {
                    card.label.normal()
                };
                let mut line = format!("  {} {:<10} {}", card.icon, card.title, label);
                if let Some(address) = &card.address {
                    line.push_str(&format!("  {}", address.dimmed()));
                }
                if card.is_current {
                    line.push_str(&format!("  ({})", THIS_NODE_LABEL.italic()));
                }
                println!("{}", line);
            }
        }
    }

    if let Some(notification) = &view.notification {
        println!();
        println!("{}", notification.cyan());
    }
    for alert in &view.alerts {
        println!("{}", format!("Warning: {}", alert).yellow());
    }
}

fn connection_label(state: ConnectionState) -> ColoredString {
    match state {
        ConnectionState::Connected => "🟢 connected".green(),
        ConnectionState::Connecting => "🟡 connecting".yellow(),
        ConnectionState::Disconnected => "🔴 disconnected".red(),
        ConnectionState::Disabled => "disabled".dimmed(),
    }
}
