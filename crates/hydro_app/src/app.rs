use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use hydro_core::{
    clock::{Clock, SystemClock},
    detector::{EventDetector, ReminderWindow, ScanReport},
    plant::{NewPlant, PlantSource},
    presenter::{NotificationList, Presenter, UnreadBadge},
    settings::{Settings, SettingsStore},
    storage::{FileStorage, Storage},
    store::{NotificationStore, Retention},
};
use tracing::{info, warn};

use crate::api::PlantsClient;
use crate::cli::{Command, PlantCommand, SettingsCommand};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) data_dir: PathBuf,
    pub(crate) api_url: String,
    pub(crate) api_token: Option<String>,
    pub(crate) reminder_window: ReminderWindow,
    pub(crate) retention: Retention,
    pub(crate) check_interval: Duration,
    pub(crate) http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("HYDRO_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(url) = std::env::var("HYDRO_API_URL") {
            if !url.trim().is_empty() {
                config.api_url = url.trim().to_string();
            }
        }
        if let Ok(token) = std::env::var("HYDRO_API_TOKEN") {
            config.api_token = Some(token);
        }
        if let Ok(flag) = std::env::var("HYDRO_REMINDER_CATCH_UP") {
            if matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes") {
                config.reminder_window = ReminderWindow::OnOrAfterDue;
            }
        }
        if let Ok(max) = std::env::var("HYDRO_MAX_NOTIFICATIONS") {
            if let Ok(value) = max.trim().parse::<usize>() {
                if value > 0 {
                    config.retention = config.retention.with_max_records(value);
                }
            }
        }
        if let Ok(days) = std::env::var("HYDRO_ARCHIVE_READ_AFTER_DAYS") {
            if let Ok(value) = days.trim().parse::<i64>() {
                if value >= 0 {
                    config.retention = config
                        .retention
                        .with_read_horizon(chrono::Duration::days(value));
                }
            }
        }
        if let Ok(secs) = std::env::var("HYDRO_CHECK_INTERVAL_SECS") {
            if let Ok(value) = secs.trim().parse::<u64>() {
                if value > 0 {
                    config.check_interval = Duration::from_secs(value);
                }
            }
        }
        if let Ok(secs) = std::env::var("HYDRO_HTTP_TIMEOUT_SECS") {
            if let Ok(value) = secs.trim().parse::<u64>() {
                if value > 0 {
                    config.http_timeout = Duration::from_secs(value);
                }
            }
        }
        Ok(config)
    }

    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.data_dir = dir;
        }
        self
    }

    pub fn with_api_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.api_url = url;
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".hydro"),
            api_url: "http://localhost:5000".to_string(),
            api_token: None,
            reminder_window: ReminderWindow::default(),
            retention: Retention::default(),
            check_interval: Duration::from_secs(3600),
            http_timeout: Duration::from_secs(10),
        }
    }
}

/// Field changes for `plants update`; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct PlantEdit {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub planted: Option<NaiveDate>,
    pub transplant: Option<NaiveDate>,
    pub clear_transplant: bool,
    pub image: Option<String>,
}

/// Wires the store, detector, settings and plants client for one process.
pub struct HydroApp {
    config: AppConfig,
    store: Arc<NotificationStore>,
    settings: SettingsStore,
    plants: Arc<PlantsClient>,
    detector: EventDetector,
}

impl HydroApp {
    pub fn new(config: AppConfig) -> Result<Self> {
        info!(
            data_dir = %config.data_dir.display(),
            api = %config.api_url,
            "initializing hydro app"
        );
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&config.data_dir));
        let store = Arc::new(
            NotificationStore::builder()
                .with_storage(Arc::clone(&storage))
                .with_clock(Arc::new(SystemClock))
                .with_retention(config.retention)
                .build(),
        );
        let plants = Arc::new(
            PlantsClient::new(&config.api_url, config.api_token.clone(), config.http_timeout)
                .context("failed to initialize plants client")?,
        );
        let source: Arc<dyn PlantSource> = plants.clone();
        let detector = EventDetector::new(source, Arc::clone(&store))
            .with_window(config.reminder_window);
        Ok(Self {
            settings: SettingsStore::new(storage),
            config,
            store,
            plants,
            detector,
        })
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    pub fn check(&self) -> Result<ScanReport> {
        let start = Instant::now();
        let report = self
            .detector
            .check_system_events()
            .context("reminder scan failed")?;
        info!(elapsed_ms = %start.elapsed().as_millis(), "reminder scan completed");
        Ok(report)
    }

    pub fn notifications_text(&self) -> String {
        let list = Presenter::mount(Arc::clone(&self.store), NotificationList::default());
        let badge = Presenter::mount(Arc::clone(&self.store), UnreadBadge::default());
        let unread = badge.with_view(|b| b.unread());
        format!("{} unread\n\n{}", unread, list.with_view(|l| l.to_text()))
    }

    pub fn mark_read(&self, id: &str) -> Result<bool> {
        self.store
            .mark_read(id)
            .with_context(|| format!("failed to mark {id} read"))
    }

    pub fn mark_all_read(&self) -> Result<usize> {
        self.store
            .mark_all_read()
            .context("failed to mark notifications read")
    }

    /// Scans every `check_interval`. Failed scans are logged and the loop
    /// carries on with the next tick.
    pub fn watch(&self, iterations: Option<u64>) -> Result<()> {
        let badge = Presenter::mount(Arc::clone(&self.store), UnreadBadge::default());
        let mut last_label = badge.with_view(|b| b.label());
        print_badge(&last_label);

        let mut tick: u64 = 0;
        loop {
            if let Err(err) = self.check() {
                let detail = format!("{err:#}");
                warn!(error = %detail, "scan failed, will retry next tick");
            }
            let label = badge.with_view(|b| b.label());
            if label != last_label {
                print_badge(&label);
                last_label = label;
            }
            tick += 1;
            if iterations.is_some_and(|limit| tick >= limit) {
                return Ok(());
            }
            std::thread::sleep(self.config.check_interval);
        }
    }

    pub fn list_plants_text(&self) -> Result<String> {
        let plants = self.plants.list_plants()?;
        if plants.is_empty() {
            return Ok("No plants registered.".to_string());
        }
        let today = SystemClock.today();
        let mut lines = Vec::with_capacity(plants.len());
        for plant in plants {
            let transplant = match plant.days_until_transplant(today) {
                Some(days) => format_relative_days(days),
                None => "not scheduled".to_string(),
            };
            lines.push(format!(
                "{}  {} ({})  planted {}  transplant {}",
                plant.id,
                plant.name,
                plant.kind.as_deref().unwrap_or("Type not specified"),
                plant.planting_date,
                transplant
            ));
        }
        Ok(lines.join("\n"))
    }

    pub fn add_plant(&self, plant: NewPlant) -> Result<String> {
        let created = self.plants.add_plant(&plant)?;
        info!(id = %created.id, name = %created.name, "plant added");
        Ok(created.id)
    }

    pub fn show_plant_text(&self, id: &str) -> Result<String> {
        let plant = self.plants.get_plant(id)?;
        let remaining = plant.days_until_transplant(SystemClock.today());
        let transplant = match (plant.transplant_date, remaining) {
            (Some(day), Some(days)) => format!("{day} ({})", format_relative_days(days)),
            _ => "not scheduled".to_string(),
        };
        Ok(format!(
            "{}\n  id:         {}\n  type:       {}\n  planted:    {}\n  transplant: {}\n  image:      {}",
            plant.name,
            plant.id,
            plant.kind.as_deref().unwrap_or("Type not specified"),
            plant.planting_date,
            transplant,
            plant.image.as_deref().unwrap_or("none"),
        ))
    }

    pub fn update_plant(&self, id: &str, edit: PlantEdit) -> Result<()> {
        let current = self.plants.get_plant(id)?;
        let transplant_date = if edit.clear_transplant {
            None
        } else {
            edit.transplant.or(current.transplant_date)
        };
        let updated = NewPlant {
            name: edit.name.unwrap_or(current.name),
            kind: edit.kind.or(current.kind).unwrap_or_default(),
            planting_date: edit.planted.unwrap_or(current.planting_date),
            transplant_date,
            image: edit.image.or(current.image),
        };
        anyhow::ensure!(!updated.name.trim().is_empty(), "please enter a plant name");
        let saved = self.plants.update_plant(id, &updated)?;
        info!(id = %saved.id, name = %saved.name, "plant updated");
        Ok(())
    }

    pub fn delete_plant(&self, id: &str) -> Result<()> {
        self.plants.delete_plant(id)?;
        info!(id, "plant deleted");
        Ok(())
    }

    pub fn settings(&self) -> Settings {
        self.settings.load()
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.settings
            .save(settings)
            .context("failed to save settings")
    }

    /// Wipes every locally stored record. Returns how many notifications
    /// were dropped.
    pub fn reset_local_data(&self) -> Result<usize> {
        let dropped = self
            .store
            .clear()
            .context("failed to clear notifications")?;
        self.settings.reset().context("failed to reset settings")?;
        info!(dropped, data_dir = %self.config.data_dir.display(), "local data cleared");
        Ok(dropped)
    }
}

pub fn run(config: AppConfig, command: Command) -> Result<()> {
    let app = HydroApp::new(config)?;
    match command {
        Command::Check => {
            let report = app.check()?;
            println!(
                "scanned {} plants, {} due, {} new reminders, {} already sent",
                report.plants_scanned,
                report.plants_due,
                report.created.len(),
                report.duplicates_skipped
            );
            for record in &report.created {
                println!("  {}: {}", record.title, record.message);
            }
        }
        Command::Notifications => println!("{}", app.notifications_text()),
        Command::Read { id } => {
            if !app.mark_read(&id)? {
                eprintln!("no notification with id {id}");
            }
        }
        Command::ReadAll => {
            let count = app.mark_all_read()?;
            println!("marked {count} notifications read");
        }
        Command::Watch { iterations } => app.watch(iterations)?,
        Command::Plants { action } => run_plant_command(&app, action)?,
        Command::Settings { action } => run_settings_command(&app, action)?,
    }
    Ok(())
}

fn run_plant_command(app: &HydroApp, action: PlantCommand) -> Result<()> {
    match action {
        PlantCommand::List => println!("{}", app.list_plants_text()?),
        PlantCommand::Add {
            name,
            kind,
            planted,
            transplant,
            image,
        } => {
            let name = name.trim().to_string();
            let kind = kind.trim().to_string();
            anyhow::ensure!(!name.is_empty(), "please enter a plant name");
            anyhow::ensure!(!kind.is_empty(), "please select a plant type");
            let id = app.add_plant(NewPlant {
                name: name.clone(),
                kind,
                planting_date: planted.unwrap_or_else(|| SystemClock.today()),
                transplant_date: transplant,
                image: image.filter(|url| !url.trim().is_empty()),
            })?;
            println!("{name} has been added to your system ({id}).");
        }
        PlantCommand::Show { id } => println!("{}", app.show_plant_text(&id)?),
        PlantCommand::Update {
            id,
            name,
            kind,
            planted,
            transplant,
            clear_transplant,
            image,
        } => {
            app.update_plant(
                &id,
                PlantEdit {
                    name,
                    kind,
                    planted,
                    transplant,
                    clear_transplant,
                    image,
                },
            )?;
            println!("updated {id}");
        }
        PlantCommand::Delete { id } => {
            app.delete_plant(&id)?;
            println!("deleted {id}");
        }
    }
    Ok(())
}

fn run_settings_command(app: &HydroApp, action: SettingsCommand) -> Result<()> {
    match action {
        SettingsCommand::Show => print_settings(&app.settings()),
        SettingsCommand::Set {
            username,
            email,
            dark_mode,
            sync_interval,
        } => {
            let mut settings = app.settings();
            if let Some(username) = username {
                settings.username = username;
            }
            if let Some(email) = email {
                settings.email = email.trim().to_string();
            }
            if let Some(dark_mode) = dark_mode {
                settings.dark_mode = dark_mode;
            }
            if let Some(interval) = sync_interval {
                settings.data_sync_interval = interval;
            }
            app.save_settings(&settings)?;
            print_settings(&settings);
        }
        SettingsCommand::Reset { yes } => {
            anyhow::ensure!(
                yes,
                "this erases all notifications and settings; pass --yes to confirm"
            );
            let dropped = app.reset_local_data()?;
            println!("cleared {dropped} notifications and restored default settings");
        }
    }
    Ok(())
}

fn print_settings(settings: &Settings) {
    println!("username:      {}", settings.username);
    println!("email:         {}", settings.email);
    println!("dark mode:     {}", settings.dark_mode);
    println!("sync interval: {}", settings.data_sync_interval);
}

fn print_badge(label: &Option<String>) {
    match label {
        Some(count) => println!("notifications: {count} unread"),
        None => println!("notifications: all caught up"),
    }
}

fn format_relative_days(diff: i64) -> String {
    match diff {
        -1 => "yesterday".to_string(),
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        d if d < 0 => format!("{} days ago", -d),
        d => format!("in {} days", d),
    }
}
