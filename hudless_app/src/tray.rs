//! Menu-bar runtime: owns the interception session and drives it from the
//! tao event loop.

use crate::config::Config;
use crate::login_item::{LoginItem, LoginItemStatus};
use hudless_lib::os::MacPlatform;
use hudless_lib::{Channel, ChannelState, Interceptor, SessionError, TaskQueue};
use rfd::{MessageDialog, MessageLevel};
use std::process::Command;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoopBuilder};
use tao::platform::macos::{ActivationPolicy, EventLoopExtMacOS};
use tracing::{debug, info, warn};
use tray_icon::{
    menu::{CheckMenuItem, Menu, MenuEvent, MenuItem, PredefinedMenuItem},
    Icon as TrayIconImage, TrayIcon, TrayIconBuilder,
};

const PERMISSION_POLL: Duration = Duration::from_secs(2);
const ICON_SIZE: u32 = 32;
const ACCESSIBILITY_SETTINGS: &str = "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility";
const LOGIN_ITEMS_SETTINGS: &str = "x-apple.systempreferences:com.apple.LoginItems-Settings.extension";

fn show_error_dialog(msg: &str) {
    MessageDialog::new()
        .set_level(MessageLevel::Error)
        .set_title("hudless")
        .set_description(msg)
        .show();
}

fn show_info_dialog(msg: &str) {
    MessageDialog::new()
        .set_level(MessageLevel::Info)
        .set_title("hudless")
        .set_description(msg)
        .show();
}

fn open_settings(url: &str) {
    if let Err(err) = Command::new("open").arg(url).spawn() {
        warn!(%err, url, "failed to open System Settings");
    }
}

fn channel_line(channel: Channel, state: &ChannelState) -> String {
    let label = match channel {
        Channel::Volume => "Volume keys",
        Channel::Brightness => "Brightness keys",
    };
    match (state.working, &state.last_error) {
        (true, _) => format!("{label}: handled"),
        (false, Some(reason)) => format!("{label}: passed to system ({reason})"),
        (false, None) => format!("{label}: passed to system"),
    }
}

fn accessibility_line(trusted: bool) -> &'static str {
    if trusted {
        "Accessibility: granted"
    } else {
        "Accessibility: not granted"
    }
}

/// Speaker glyph with a strike-through, drawn straight into RGBA.
fn indicator_icon() -> anyhow::Result<TrayIconImage> {
    let size = ICON_SIZE as i32;
    let mut pixels = vec![0u8; (ICON_SIZE * ICON_SIZE * 4) as usize];
    let mut plot = |x: i32, y: i32| {
        if (0..size).contains(&x) && (0..size).contains(&y) {
            let i = ((y * size + x) * 4) as usize;
            pixels[i..i + 4].copy_from_slice(&[0, 0, 0, 0xFF]);
        }
    };
    for y in 12..20 {
        for x in 6..11 {
            plot(x, y);
        }
    }
    for x in 11..19 {
        let reach = x - 11;
        for y in (12 - reach)..(20 + reach) {
            plot(x, y);
        }
    }
    for t in 0..24 {
        plot(4 + t, 4 + t);
        plot(5 + t, 4 + t);
    }
    Ok(TrayIconImage::from_rgba(pixels, ICON_SIZE, ICON_SIZE)?)
}

struct TrayState {
    tray: TrayIcon,
    tm_suppress_check: CheckMenuItem,
    tm_last_error: MenuItem,
    tm_volume_status: MenuItem,
    tm_brightness_status: MenuItem,
    tm_accessibility_status: MenuItem,
    tm_request_permission: MenuItem,
    tm_open_accessibility: MenuItem,
    tm_login_check: CheckMenuItem,
    tm_login_status: MenuItem,
    tm_open_login_items: MenuItem,
    tm_hide_indicator: MenuItem,
    tm_quit: MenuItem,
}

fn create_tray(config: &Config, login_status: LoginItemStatus) -> anyhow::Result<TrayState> {
    let menu = Menu::new();

    let tm_suppress_check = CheckMenuItem::new("Suppress system HUD", true, true, None);
    let tm_last_error = MenuItem::new("", false, None);
    let tm_volume_status = MenuItem::new(channel_line(Channel::Volume, &ChannelState::default()), false, None);
    let tm_brightness_status =
        MenuItem::new(channel_line(Channel::Brightness, &ChannelState::default()), false, None);
    let tm_accessibility_status = MenuItem::new(accessibility_line(false), false, None);
    let tm_request_permission = MenuItem::new("Request Accessibility permission", true, None);
    let tm_open_accessibility = MenuItem::new("Open Accessibility settings…", true, None);
    let tm_login_check = CheckMenuItem::new("Start at login", true, login_status.is_enabled(), None);
    let tm_login_status = MenuItem::new(login_status.to_string(), false, None);
    let tm_open_login_items = MenuItem::new("Open Login Items settings…", true, None);
    let tm_hide_indicator = MenuItem::new("Hide menu bar icon", true, None);
    let tm_quit = MenuItem::new("Quit", true, None);

    menu.append(&tm_suppress_check)?;
    menu.append(&tm_last_error)?;
    menu.append(&tm_volume_status)?;
    menu.append(&tm_brightness_status)?;
    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&tm_accessibility_status)?;
    menu.append(&tm_request_permission)?;
    menu.append(&tm_open_accessibility)?;
    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&tm_login_check)?;
    menu.append(&tm_login_status)?;
    menu.append(&tm_open_login_items)?;
    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&tm_hide_indicator)?;
    menu.append(&tm_quit)?;

    let tray = TrayIconBuilder::new()
        .with_tooltip("hudless")
        .with_icon(indicator_icon()?)
        .with_icon_as_template(true)
        .with_menu(Box::new(menu))
        .build()?;
    tray.set_visible(config.show_indicator)?;

    Ok(TrayState {
        tray,
        tm_suppress_check,
        tm_last_error,
        tm_volume_status,
        tm_brightness_status,
        tm_accessibility_status,
        tm_request_permission,
        tm_open_accessibility,
        tm_login_check,
        tm_login_status,
        tm_open_login_items,
        tm_hide_indicator,
        tm_quit,
    })
}

enum UserEvent {
    Menu(MenuEvent),
    Wake,
    Shutdown,
}

struct RuntimeState {
    config: Config,
    tray: TrayState,
    interceptor: Interceptor<MacPlatform>,
    login_item: LoginItem,
    suppression_requested: bool,
    trusted: bool,
    next_permission_poll: Instant,
}

impl RuntimeState {
    fn new(config: Config, tray: TrayState, queue: TaskQueue, login_item: LoginItem) -> RuntimeState {
        let mut interceptor = Interceptor::new(MacPlatform::new(), queue);
        {
            let volume = tray.tm_volume_status.clone();
            let brightness = tray.tm_brightness_status.clone();
            interceptor.on_state_change(move |channel, state| {
                let item = match channel {
                    Channel::Volume => &volume,
                    Channel::Brightness => &brightness,
                };
                item.set_text(channel_line(channel, state));
            });
        }
        let trusted = interceptor.is_trusted();
        let mut state = RuntimeState {
            config,
            tray,
            interceptor,
            login_item,
            suppression_requested: true,
            trusted,
            next_permission_poll: Instant::now() + PERMISSION_POLL,
        };
        if !trusted {
            state.interceptor.request_trust();
        }
        state.start_session();
        state
    }

    fn start_session(&mut self) {
        match self.interceptor.start() {
            Ok(()) => {}
            Err(SessionError::PermissionDenied) => {
                debug!("waiting for accessibility permission");
            }
            Err(err) => {
                self.suppression_requested = false;
                show_error_dialog(&format!("Cannot intercept media keys: {err}"));
            }
        }
        self.refresh_status();
    }

    fn refresh_status(&mut self) {
        self.tray.tm_suppress_check.set_checked(self.suppression_requested);
        let error = self.interceptor.last_error().unwrap_or_default();
        self.tray.tm_last_error.set_text(error);
        for (channel, item) in [
            (Channel::Volume, &self.tray.tm_volume_status),
            (Channel::Brightness, &self.tray.tm_brightness_status),
        ] {
            item.set_text(channel_line(channel, &self.interceptor.channel_state(channel)));
        }
        self.tray
            .tm_accessibility_status
            .set_text(accessibility_line(self.trusted));
        self.tray.tm_request_permission.set_enabled(!self.trusted);
    }

    fn refresh_login_item(&mut self, status: LoginItemStatus) {
        self.tray.tm_login_check.set_checked(status.is_enabled());
        self.tray.tm_login_status.set_text(status.to_string());
    }

    fn save_config(&self) {
        if let Err(err) = self.config.save() {
            show_error_dialog(&format!("Error saving config: {err:?}"));
        }
    }

    fn handle_menu_event(&mut self, event: MenuEvent) -> bool {
        if event.id == self.tray.tm_quit.id() {
            return true;
        }

        if event.id == self.tray.tm_suppress_check.id() {
            self.suppression_requested = self.tray.tm_suppress_check.is_checked();
            info!(enabled = self.suppression_requested, "suppression toggled");
            if self.suppression_requested {
                self.start_session();
            } else {
                self.interceptor.stop();
                self.refresh_status();
            }
        }

        if event.id == self.tray.tm_request_permission.id() {
            self.interceptor.request_trust();
        }

        if event.id == self.tray.tm_open_accessibility.id() {
            open_settings(ACCESSIBILITY_SETTINGS);
        }

        if event.id == self.tray.tm_open_login_items.id() {
            open_settings(LOGIN_ITEMS_SETTINGS);
        }

        if event.id == self.tray.tm_login_check.id() {
            let enabled = self.tray.tm_login_check.is_checked();
            let status = match self.login_item.set_enabled(enabled) {
                Ok(status) => status,
                Err(err) => {
                    show_error_dialog(&format!("{err}"));
                    self.login_item.status()
                }
            };
            self.refresh_login_item(status);
        }

        if event.id == self.tray.tm_hide_indicator.id() {
            show_info_dialog("The menu bar icon will be hidden. Launch hudless with --show-indicator to bring it back.");
            if let Err(err) = self.tray.tray.set_visible(false) {
                warn!(%err, "failed to hide menu bar icon");
                return false;
            }
            self.config.show_indicator = false;
            self.save_config();
        }

        false
    }

    /// Re-polls permission and starts the session once trust is granted.
    fn tick(&mut self) {
        let now = Instant::now();
        if now < self.next_permission_poll {
            return;
        }
        self.next_permission_poll = now + PERMISSION_POLL;

        let trusted = self.interceptor.is_trusted();
        if trusted != self.trusted {
            info!(trusted, "accessibility permission changed");
            self.trusted = trusted;
            if trusted && self.suppression_requested && !self.interceptor.is_running() {
                self.start_session();
                return;
            }
            self.refresh_status();
        }
    }

    fn shutdown(mut self) {
        self.interceptor.stop();
        info!("hudless stopped");
    }
}

pub fn run(config: Config) {
    let mut event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
    event_loop.set_activation_policy(ActivationPolicy::Accessory);
    event_loop.set_dock_visibility(false);

    let proxy = event_loop.create_proxy();
    MenuEvent::set_event_handler(Some(move |event| {
        _ = proxy.send_event(UserEvent::Menu(event));
    }));
    let proxy = event_loop.create_proxy();
    if let Err(err) = ctrlc::set_handler(move || {
        _ = proxy.send_event(UserEvent::Shutdown);
    }) {
        warn!(?err, "failed to register shutdown signal handler");
    }
    let proxy = Mutex::new(event_loop.create_proxy());
    let mut queue = Some(TaskQueue::with_waker(move || {
        let proxy = proxy.lock().unwrap_or_else(|p| p.into_inner());
        _ = proxy.send_event(UserEvent::Wake);
    }));

    let mut runtime: Option<RuntimeState> = None;
    let mut initial_config = Some(config);

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::WaitUntil(Instant::now() + PERMISSION_POLL);

        match event {
            Event::NewEvents(StartCause::Init) => {
                let (Some(config), Some(queue)) = (initial_config.take(), queue.take()) else {
                    *control_flow = ControlFlow::Exit;
                    return;
                };
                let login_item = LoginItem::new();
                let tray = match create_tray(&config, login_item.status()) {
                    Ok(tray) => tray,
                    Err(err) => {
                        show_error_dialog(&format!("Error creating tray: {err:?}"));
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                };
                runtime = Some(RuntimeState::new(config, tray, queue, login_item));
            }
            Event::UserEvent(UserEvent::Wake) => {
                if let Some(state) = runtime.as_mut() {
                    state.interceptor.pump();
                }
            }
            Event::UserEvent(UserEvent::Menu(event)) => {
                if let Some(state) = runtime.as_mut() {
                    if state.handle_menu_event(event) {
                        if let Some(state) = runtime.take() {
                            state.shutdown();
                        }
                        *control_flow = ControlFlow::Exit;
                    }
                }
            }
            Event::UserEvent(UserEvent::Shutdown) => {
                if let Some(state) = runtime.take() {
                    state.shutdown();
                }
                *control_flow = ControlFlow::Exit;
            }
            Event::MainEventsCleared => {
                if let Some(state) = runtime.as_mut() {
                    state.interceptor.pump();
                    state.tick();
                }
            }
            Event::LoopDestroyed => {
                if let Some(state) = runtime.take() {
                    state.shutdown();
                }
            }
            _ => {}
        }
    });
}
