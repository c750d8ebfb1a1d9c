use iced::{Alignment, Application, Command, Element, Length, Padding, Settings, Size, Subscription, window};
use iced::event::{self, Event};
use iced::executor;
use iced::theme::{self, Theme};
use iced::widget::{Canvas, button, column, container, text};
use log::info;
use tokio_util::sync::{CancellationToken};

use crate::config::types::Config;
use crate::dashboard::Dashboard;
use crate::device::connection::{connect_device_subscription, SessionOptions};
use crate::device::types::{DeviceEvent, DeviceState};
use crate::error::AppRunError;
use crate::gui::progress::{ProgressRing, RING_SIZE};
use crate::gui::style::{BackgroundStyleSheet, PanelStyleSheet};
use crate::gui::types::Message;

pub struct ApplicationFlags {
    pub config: Config,
    pub notices: Vec<String>,
}

pub struct StepSenseApplication {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,

    // messages that the user must click away
    notices: Vec<String>,

    session_options: SessionOptions,
    dashboard: Dashboard,
}

impl StepSenseApplication {
    fn before_close(&mut self) {
        self.app_cancel.cancel();
    }

    fn on_device_event(&mut self, event: DeviceEvent) {
        if let DeviceEvent::StateChange(DeviceState::SearchFailed { no_permission: true }) = &event {
            self.notices.push(
                "This application is not allowed to access Bluetooth. \
Grant Bluetooth access to this application in the settings of your operating system, \
and then restart the application.".to_string()
            );
        }

        self.dashboard.apply(event);
    }
}

impl Application for StepSenseApplication {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ApplicationFlags;

    fn new(flags: ApplicationFlags) -> (StepSenseApplication, Command<Self::Message>) {
        let app = StepSenseApplication {
            app_cancel: CancellationToken::new(),
            notices: flags.notices,
            session_options: SessionOptions::from(&flags.config),
            dashboard: Dashboard::new(flags.config.step_goal),
        };

        (app, Command::none())
    }

    fn title(&self) -> String {
        String::from(concat!("Step Sense ", env!("CARGO_PKG_VERSION")))
    }

    fn update(&mut self, message: Message) -> Command<Self::Message> {
        match message {
            Message::NoticeConfirmed => {
                if !self.notices.is_empty() {
                    self.notices.remove(0);
                }
            },
            Message::EventOccurred(Event::Window(id, window::Event::CloseRequested)) => {
                info!("Close requested");
                self.before_close();
                return window::close(id);
            },
            Message::DeviceEvent(event) => {
                self.on_device_event(event);
            },
            _ => {}
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            event::listen().map(Message::EventOccurred),
            connect_device_subscription(
                self.session_options.clone(),
                self.app_cancel.clone(),
                vec![],
            ).map(Message::DeviceEvent)
        ])
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }

    fn view(&self) -> Element<Message> {
        if let Some(notice) = self.notices.first() {
            return container(
                column![
                    text(notice),

                    button(text("Okay"))
                        .on_press(Message::NoticeConfirmed),

                ].align_items(Alignment::Center).spacing(20),
            )
            .width(Length::Fill)
            .padding(20)
            .into()
        }

        let title = container(
            text("Step Sense").size(18)
        )
            .padding([10, 20])
            .style(theme::Container::Custom(Box::new(PanelStyleSheet { radius: 15.0 })));

        let ring = Canvas::new(ProgressRing {
            steps: self.dashboard.steps().to_string(),
            percent: self.dashboard.percent_label(),
            progress: self.dashboard.progress(),
        })
            .width(Length::Fixed(RING_SIZE))
            .height(Length::Fixed(RING_SIZE));

        let mut status = column![
            text(self.dashboard.status_label()).size(20),
        ].align_items(Alignment::Center).spacing(4);

        if let (DeviceState::Connected { .. }, Some(device_id)) = (self.dashboard.state(), self.dashboard.device_id()) {
            status = status.push(text(device_id).size(12));
        }

        let status_panel = container(status)
            .width(Length::Fill)
            .height(110)
            .center_x()
            .center_y()
            .style(theme::Container::Custom(Box::new(PanelStyleSheet { radius: 20.0 })));

        container(
            column![
                column![title, ring]
                    .spacing(40)
                    .align_items(Alignment::Center)
                    .width(Length::Fill)
                    .height(Length::Fill),

                status_panel,
            ]
                .align_items(Alignment::Center)
                .padding(Padding { top: 40.0, right: 20.0, bottom: 20.0, left: 20.0 }),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .style(theme::Container::Custom(Box::new(BackgroundStyleSheet)))
        .into()
    }
}

pub fn run_application(config: Config, notices: Vec<String>) -> Result<(), AppRunError> {
    let flags = ApplicationFlags { config, notices };
    let mut settings = Settings::with_flags(flags);

    // handle exits ourselves (Event::CloseRequested)
    settings.id = Some("step-sense".to_string());
    settings.window.exit_on_close_request = false;
    settings.window.size = Size::new(420.0, 640.0);
    settings.window.resizable = false;

    // this function will call process::exit() unless there was a startup error
    StepSenseApplication::run(settings)?;
    Ok(())
}
