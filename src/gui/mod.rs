//! Desktop control panel.
//!
//! All state lives in the [`Controller`]; this module only draws it and forwards clicks.
//! Polling runs on the UI thread from [`eframe::App::update`], paced by a [`PollTimer`].

mod panels;

use std::time::{Duration, Instant};

use eframe::egui;

use crate::{
    controller::Controller,
    poller::PollTimer,
    port::SystemPorts,
    types::{CurrentUnit, Quantity},
};

pub const APP_NAME: &str = "Korad PSU Control";

pub struct KoradApp {
    controller: Controller<SystemPorts>,
    timer: PollTimer,
    voltage_input: String,
    current_input: String,
    unit: CurrentUnit,
}

impl KoradApp {
    pub fn new(controller: Controller<SystemPorts>, poll_interval: Duration) -> Self {
        Self {
            controller,
            timer: PollTimer::new(poll_interval),
            voltage_input: String::new(),
            current_input: String::new(),
            unit: CurrentUnit::default(),
        }
    }

    fn input_mut(&mut self, quantity: Quantity) -> &mut String {
        match quantity {
            Quantity::Voltage => &mut self.voltage_input,
            Quantity::Current => &mut self.current_input,
        }
    }
}

impl eframe::App for KoradApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.controller.is_connected() && self.timer.tick(Instant::now()) {
            self.controller.poll();
        }

        egui::TopBottomPanel::top("connection").show(ctx, |ui| self.connection_bar(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |columns| {
                self.setpoint_column(&mut columns[0], Quantity::Voltage);
                self.setpoint_column(&mut columns[1], Quantity::Current);
            });
            ui.separator();
            ui.horizontal(|ui| {
                self.output_group(ui);
                self.unit_group(ui);
                self.readouts(ui);
            });
            ui.separator();
            self.plots(ui);
        });

        if self.controller.is_connected() {
            ctx.request_repaint_after(self.timer.remaining(Instant::now()));
        }
    }
}
