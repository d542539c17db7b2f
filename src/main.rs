//! Korad PSU control panel - egui desktop application

use clap::Parser;
use eframe::egui;
use korad_psu::{
    config::ConnectionArgs,
    controller::Controller,
    gui::{APP_NAME, KoradApp},
    logging,
    port::SystemPorts,
};

#[derive(Parser, Debug)]
#[command(version, about = "Control panel for Korad bench power supplies")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
}

fn main() -> eframe::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();

    tracing::info!("Starting {APP_NAME}");

    let mut controller = Controller::new(SystemPorts, cli.connection.serial_config());
    controller.refresh_ports();
    if cli.connection.autoconnect {
        controller.autoconnect();
    } else if let Some(port) = &cli.connection.port {
        controller.select_port(port.as_str());
        controller.connect(port);
    }
    let app = KoradApp::new(controller, cli.connection.poll_interval());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 900.0])
            .with_min_inner_size([720.0, 600.0])
            .with_title(APP_NAME),
        ..Default::default()
    };

    eframe::run_native(APP_NAME, options, Box::new(|_cc| Ok(Box::new(app))))
}
