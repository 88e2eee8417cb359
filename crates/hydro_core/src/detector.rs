use std::sync::Arc;

use chrono::NaiveDate;
use tracing::instrument;

use crate::{
    error::DetectorError,
    notifications::{Category, NotificationRecord},
    plant::{Plant, PlantSource},
    store::NotificationStore,
};

pub const TRANSPLANT_TITLE: &str = "Transplant Reminder";

/// Which transplant days produce a reminder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReminderWindow {
    /// Only on the transplant day itself, at most once per calendar day.
    #[default]
    DueDayOnly,
    /// On the transplant day or any later scan, exactly once per plant.
    OnOrAfterDue,
}

impl ReminderWindow {
    fn is_due(self, days_remaining: i64) -> bool {
        match self {
            ReminderWindow::DueDayOnly => days_remaining == 0,
            ReminderWindow::OnOrAfterDue => days_remaining <= 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub plants_scanned: usize,
    pub plants_due: usize,
    pub duplicates_skipped: usize,
    pub created: Vec<NotificationRecord>,
}

pub struct EventDetector {
    plants: Arc<dyn PlantSource>,
    store: Arc<NotificationStore>,
    window: ReminderWindow,
}

impl EventDetector {
    pub fn new(plants: Arc<dyn PlantSource>, store: Arc<NotificationStore>) -> Self {
        Self {
            plants,
            store,
            window: ReminderWindow::default(),
        }
    }

    pub fn with_window(mut self, window: ReminderWindow) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> ReminderWindow {
        self.window
    }

    /// Scans every plant once and files a germination reminder for each
    /// transplant that is due and not yet reminded. A failed plant fetch
    /// abandons the scan before anything is written.
    #[instrument(skip(self))]
    pub fn check_system_events(&self) -> Result<ScanReport, DetectorError> {
        let plants = self.plants.plants().map_err(DetectorError::PlantFetch)?;
        let mut known = self.store.list();
        let today = self.store.clock().today();

        let mut report = ScanReport {
            plants_scanned: plants.len(),
            ..ScanReport::default()
        };

        for plant in &plants {
            let Some(days_remaining) = plant.days_until_transplant(today) else {
                continue;
            };
            if !self.window.is_due(days_remaining) {
                continue;
            }
            report.plants_due += 1;

            if self.already_reminded(&known, plant, today) {
                tracing::debug!(plant = %plant.name, "transplant reminder already sent");
                report.duplicates_skipped += 1;
                continue;
            }

            let record = self.store.create_for_subject(
                plant.id.clone(),
                TRANSPLANT_TITLE,
                transplant_message(plant, days_remaining),
                Category::Germination,
            )?;
            tracing::info!(plant = %plant.name, id = %record.id, "transplant reminder created");
            known.insert(0, record.clone());
            report.created.push(record);
        }

        tracing::info!(
            scanned = report.plants_scanned,
            due = report.plants_due,
            created = report.created.len(),
            skipped = report.duplicates_skipped,
            "system event scan finished"
        );
        Ok(report)
    }

    fn already_reminded(
        &self,
        known: &[NotificationRecord],
        plant: &Plant,
        today: NaiveDate,
    ) -> bool {
        known
            .iter()
            .filter(|record| record.is_about(&plant.id, &Category::Germination))
            .any(|record| match self.window {
                ReminderWindow::DueDayOnly => record.created_on() == today,
                ReminderWindow::OnOrAfterDue => true,
            })
    }
}

fn transplant_message(plant: &Plant, days_remaining: i64) -> String {
    match days_remaining {
        0 => format!(
            "{} is ready to be moved from germination to the main system today.",
            plant.name
        ),
        -1 => format!(
            "{} was due to move from germination to the main system yesterday.",
            plant.name
        ),
        _ => format!(
            "{} was due to move from germination to the main system {} days ago.",
            plant.name, -days_remaining
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FixedClock};
    use anyhow::anyhow;
    use chrono::{Duration, TimeZone, Utc};

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap())
    }

    fn plant(id: &str, name: &str, transplant: Option<NaiveDate>) -> Plant {
        Plant {
            id: id.into(),
            name: name.into(),
            kind: Some("Leafy".into()),
            planting_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            transplant_date: transplant,
            image: None,
        }
    }

    fn setup(plants: Vec<Plant>) -> (EventDetector, Arc<NotificationStore>) {
        let store = Arc::new(
            NotificationStore::builder()
                .with_clock(Arc::new(clock()))
                .build(),
        );
        let source = move || -> anyhow::Result<Vec<Plant>> { Ok(plants.clone()) };
        let detector = EventDetector::new(Arc::new(source), Arc::clone(&store));
        (detector, store)
    }

    #[test]
    fn due_today_reminds_once_per_day() {
        let today = clock().today();
        let (detector, store) = setup(vec![plant("p1", "Tomato #1", Some(today))]);

        let first = detector.check_system_events().expect("scan");
        let second = detector.check_system_events().expect("scan");
        assert_eq!(first.created.len(), 1);
        assert_eq!(second.created.len(), 0);
        assert_eq!(second.duplicates_skipped, 1);

        let records = store.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, Category::Germination);
        assert_eq!(records[0].title, TRANSPLANT_TITLE);
        assert!(records[0].message.contains("Tomato #1"));
        assert_eq!(records[0].subject.as_deref(), Some("p1"));
    }

    #[test]
    fn yesterday_tomorrow_and_unscheduled_are_ignored() {
        let today = clock().today();
        let (detector, store) = setup(vec![
            plant("a", "Lettuce", Some(today - Duration::days(1))),
            plant("b", "Cabbage", Some(today + Duration::days(1))),
            plant("c", "Mint", None),
        ]);
        let report = detector.check_system_events().expect("scan");
        assert_eq!(report.plants_scanned, 3);
        assert_eq!(report.plants_due, 0);
        assert!(store.list().is_empty());
    }

    #[test]
    fn name_substrings_do_not_suppress_other_plants() {
        let today = clock().today();
        let (detector, store) = setup(vec![
            plant("1", "Basil", Some(today)),
            plant("2", "Basil Thai", Some(today)),
        ]);
        let report = detector.check_system_events().expect("scan");
        assert_eq!(report.created.len(), 2);
        assert_eq!(store.unread_count(), 2);
    }

    #[test]
    fn catch_up_window_fires_overdue_once() {
        let today = clock().today();
        let (detector, store) = setup(vec![plant(
            "p9",
            "Chard",
            Some(today - Duration::days(3)),
        )]);
        let detector = detector.with_window(ReminderWindow::OnOrAfterDue);
        assert_eq!(detector.window(), ReminderWindow::OnOrAfterDue);

        let report = detector.check_system_events().expect("scan");
        assert_eq!(report.created.len(), 1);
        assert!(report.created[0].message.contains("3 days ago"));
        detector.check_system_events().expect("rescan");
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn plant_fetch_failure_propagates_without_writes() {
        let store = Arc::new(NotificationStore::builder().build());
        let failing = || -> anyhow::Result<Vec<Plant>> { Err(anyhow!("503 from plants api")) };
        let detector = EventDetector::new(Arc::new(failing), Arc::clone(&store));
        let err = detector.check_system_events().expect_err("fetch should fail");
        assert!(matches!(err, DetectorError::PlantFetch(_)));
        assert!(store.list().is_empty());
    }

    #[test]
    fn malformed_plant_does_not_block_due_neighbours() {
        let today = clock().today();
        let payload = format!(
            r#"[
                {{"_id":"bad","name":"Oregano","plantingDate":"2025-05-01","transplantDate":"2025/06/01"}},
                {{"_id":"worse","name":"Thyme","plantingDate":"someday"}},
                {{"_id":"ok","name":"Basil A","plantingDate":"2025-05-01","transplantDate":"{today}"}}
            ]"#
        );
        let store = Arc::new(
            NotificationStore::builder()
                .with_clock(Arc::new(clock()))
                .build(),
        );
        let source = move || -> anyhow::Result<Vec<Plant>> {
            Ok(crate::plant::decode_plants(serde_json::from_str(&payload)?))
        };
        let detector = EventDetector::new(Arc::new(source), Arc::clone(&store));

        let report = detector.check_system_events().expect("scan");
        assert_eq!(report.plants_scanned, 2);
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].subject.as_deref(), Some("ok"));
    }
}
