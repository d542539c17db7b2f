use eframe::egui::{self, Color32, RichText};
use egui_plot::{Line, Plot, PlotPoints};
use strum::IntoEnumIterator;
use tracing::debug;

use super::KoradApp;
use crate::types::{CurrentUnit, Limits, Nudge, Quantity};

const PLOT_HEIGHT: f32 = 180.0;

impl KoradApp {
    pub(super) fn connection_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let ports = self.controller.ports().to_vec();
            let selected = self.controller.selected_port().unwrap_or("(no port)").to_owned();
            egui::ComboBox::from_id_salt("port_select")
                .selected_text(selected.as_str())
                .show_ui(ui, |ui| {
                    for port in ports {
                        if ui.selectable_label(port == selected, port.as_str()).clicked() {
                            self.controller.select_port(port);
                        }
                    }
                });

            if ui.button("Refresh").clicked() {
                self.controller.refresh_ports();
            }

            let connected = self.controller.is_connected();
            let can_connect = !connected && self.controller.selected_port().is_some();
            if ui.add_enabled(can_connect, egui::Button::new("Connect")).clicked() {
                self.controller.connect_selected();
            }
            if ui.add_enabled(connected, egui::Button::new("Disconnect")).clicked() {
                self.controller.disconnect();
            }
            if ui.add_enabled(!connected, egui::Button::new("Autoconnect")).clicked() {
                self.controller.autoconnect();
            }

            ui.separator();
            ui.label(self.controller.status().to_string());
        });
    }

    pub(super) fn status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| match self.controller.last_error() {
            Some(error) => {
                ui.colored_label(Color32::LIGHT_RED, error);
            }
            None => {
                ui.weak("No errors");
            }
        });
    }

    pub(super) fn setpoint_column(&mut self, ui: &mut egui::Ui, quantity: Quantity) {
        let title = match quantity {
            Quantity::Voltage => "Voltage [V]",
            Quantity::Current => "Current [A]",
        };
        ui.heading(title);

        let setpoint = self.controller.setpoints().get(quantity);
        ui.label(RichText::new(quantity.format(setpoint)).size(40.0).monospace());

        ui.horizontal(|ui| {
            let input = self.input_mut(quantity);
            let response = ui.add(egui::TextEdit::singleline(input).desired_width(80.0));
            let entered = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Set").clicked() || entered {
                let text = self.input_mut(quantity).clone();
                if self.controller.submit(quantity, &text).is_ok() {
                    self.input_mut(quantity).clear();
                }
            }
        });

        self.dials(ui, quantity);

        let (coarse, fine): (Vec<Nudge>, Vec<Nudge>) = Nudge::iter()
            .filter(|nudge| nudge.quantity() == quantity)
            .partition(|nudge| matches!(nudge, Nudge::Volts1 | Nudge::Amps1));
        let unit = self.unit;
        ui.group(|ui| {
            ui.label(format!("[{}]", quantity.unit()));
            self.nudge_buttons(ui, (quantity, "coarse"), &coarse, unit);
        });
        ui.group(|ui| {
            let fine_title = match quantity {
                Quantity::Voltage => "[0.1 V / 0.01 V]",
                Quantity::Current => unit.group_title(),
            };
            ui.label(fine_title);
            self.nudge_buttons(ui, (quantity, "fine"), &fine, unit);
        });
    }

    fn dials(&mut self, ui: &mut egui::Ui, quantity: Quantity) {
        let (mut whole, mut fine) = self.controller.dials(quantity);
        let (max_whole, max_fine) = dial_range(self.controller.limits(), quantity);

        let coarse = ui.add(egui::Slider::new(&mut whole, 0..=max_whole).text(quantity.unit()));
        let fine_label = match quantity {
            Quantity::Voltage => "x 10 mV",
            Quantity::Current => "mA",
        };
        let fine_changed = ui
            .add(egui::Slider::new(&mut fine, 0..=max_fine).text(fine_label))
            .changed();

        if coarse.changed() || fine_changed {
            if let Err(e) = self.controller.set_dials(quantity, whole, fine) {
                debug!(%quantity, whole, fine, error = %e, "dial position rejected");
            }
        }
    }

    fn nudge_buttons(
        &mut self,
        ui: &mut egui::Ui,
        id_salt: (Quantity, &str),
        nudges: &[Nudge],
        unit: CurrentUnit,
    ) {
        egui::Grid::new(id_salt).show(ui, |ui| {
            for &nudge in nudges {
                for increase in [true, false] {
                    if ui.button(unit.nudge_label(nudge, increase)).clicked() {
                        self.controller.nudge(nudge, increase);
                    }
                }
                ui.end_row();
            }
        });
    }

    pub(super) fn output_group(&mut self, ui: &mut egui::Ui) {
        let connected = self.controller.is_connected();
        ui.group(|ui| {
            ui.vertical(|ui| {
                ui.label(format!("Output: {:?}", self.controller.output()));
                if ui.add_enabled(connected, egui::Button::new("Enable output")).clicked() {
                    self.controller.enable_output();
                }
                if ui.add_enabled(connected, egui::Button::new("Disable output")).clicked() {
                    self.controller.disable_output();
                }
            });
        });
    }

    pub(super) fn unit_group(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.vertical(|ui| {
                ui.label("Current step unit");
                for unit in CurrentUnit::iter() {
                    ui.radio_value(&mut self.unit, unit, unit.to_string());
                }
            });
        });
    }

    pub(super) fn readouts(&mut self, ui: &mut egui::Ui) {
        let readings = self.controller.readings();
        ui.group(|ui| {
            ui.vertical(|ui| {
                ui.label("Measured");
                for (quantity, value) in [
                    (Quantity::Voltage, readings.voltage),
                    (Quantity::Current, readings.current),
                ] {
                    let text = format!("{} {}", quantity.format(value), quantity.unit());
                    ui.label(RichText::new(text).size(28.0).monospace());
                }
            });
        });
    }

    pub(super) fn plots(&mut self, ui: &mut egui::Ui) {
        let series = self.controller.series();
        let traces = [
            ("voltage_plot", "Voltage", "V", series.voltage_points()),
            ("current_plot", "Current", "A", series.current_points()),
        ];
        for (id, name, unit, points) in traces {
            ui.label(format!("{name} vs time"));
            Plot::new(id)
                .height(PLOT_HEIGHT)
                .x_axis_label("Time (s)")
                .y_axis_label(unit)
                .show(ui, |plot_ui| {
                    plot_ui.line(Line::new(name, PlotPoints::new(points)).width(2.0));
                });
        }
    }
}

/// Slider ranges for the whole and fine dials of `quantity`.
fn dial_range(limits: Limits, quantity: Quantity) -> (u32, u32) {
    let whole = limits.max(quantity).max(0.0).floor() as u32;
    (whole, quantity.fine_steps() - 1)
}
