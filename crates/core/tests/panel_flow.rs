use std::{fs, path::Path, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use parking_lot::Mutex;
use slotdeck_core::{
    list::RowVisibility,
    progression::{CampaignProgress, ProgressionSnapshot},
    AppConfig, BackupsRedirect, DialogHost, DialogPurpose, DialogRequest, HostOptions, LoadResult,
    LoadTicket, ProgressionStore, ResetOutcome, SaveNameStore, SavesPanel, Screen, SlotError,
    SlotIndex, SwitchEvent, SwitchState,
};
use tempfile::{tempdir, TempDir};
use tokio::sync::oneshot;

#[derive(Default)]
struct Script {
    slot: SlotIndex,
    loaded: bool,
    loads: Vec<SlotIndex>,
    pending: Option<oneshot::Sender<LoadResult>>,
    snapshot: Option<ProgressionSnapshot>,
    wipes: usize,
    deletes: usize,
    fail_delete: bool,
}

#[derive(Clone, Default)]
struct ScriptedStore {
    script: Arc<Mutex<Script>>,
}

impl ScriptedStore {
    fn finish(&self, result: LoadResult) {
        let mut script = self.script.lock();
        script.loaded = true;
        if result.is_success() {
            script.snapshot = Some(ProgressionSnapshot {
                campaigns: vec![CampaignProgress {
                    name: "Survivor".to_string(),
                    karma: 3,
                    karma_cap: 5,
                    food: 2,
                    cycle: 14,
                    elapsed_seconds: 4000,
                }],
                ..ProgressionSnapshot::default()
            });
        }
        let sender = script.pending.take().expect("no load outstanding");
        sender.send(result).expect("ticket dropped");
    }

    fn loads(&self) -> Vec<SlotIndex> {
        self.script.lock().loads.clone()
    }
}

impl ProgressionStore for ScriptedStore {
    fn current_slot(&self) -> SlotIndex {
        self.script.lock().slot
    }

    fn destroy(&mut self, slot: SlotIndex) {
        let mut script = self.script.lock();
        if script.slot == slot {
            script.loaded = false;
            script.snapshot = None;
        }
    }

    fn begin_load(&mut self, slot: SlotIndex) -> LoadTicket {
        let mut script = self.script.lock();
        script.slot = slot;
        script.loaded = false;
        script.loads.push(slot);
        let (sender, ticket) = LoadTicket::channel();
        script.pending = Some(sender);
        ticket
    }

    fn is_loaded(&self) -> bool {
        self.script.lock().loaded
    }

    fn wipe_all(&mut self) -> Result<()> {
        let mut script = self.script.lock();
        script.wipes += 1;
        if let Some(snapshot) = script.snapshot.as_mut() {
            snapshot.campaigns.clear();
        }
        Ok(())
    }

    fn delete_save(&mut self) -> Result<()> {
        let mut script = self.script.lock();
        if script.fail_delete {
            bail!("save file is locked");
        }
        script.deletes += 1;
        script.loaded = false;
        script.snapshot = None;
        Ok(())
    }

    fn snapshot(&self) -> Option<ProgressionSnapshot> {
        self.script.lock().snapshot.clone()
    }
}

#[derive(Default)]
struct Dialogs {
    shown: Vec<DialogRequest>,
    open: bool,
}

impl Dialogs {
    fn close(&mut self) -> Option<DialogPurpose> {
        self.open = false;
        self.shown.last().map(|request| request.purpose)
    }
}

impl DialogHost for Dialogs {
    fn show(&mut self, request: DialogRequest) {
        self.shown.push(request);
        self.open = true;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

struct Fixture {
    dir: TempDir,
    config: AppConfig,
    store: ScriptedStore,
}

impl Fixture {
    fn new(files: &[&str]) -> Result<Self> {
        let dir = tempdir()?;
        let save_root = dir.path().join("saves");
        fs::create_dir_all(&save_root)?;
        for name in files {
            fs::write(save_root.join(name), "{}")?;
        }
        let config = AppConfig {
            options_file: save_root.join("options"),
            backup_root: dir.path().join("backups"),
            save_root,
            slot_window: 4,
            card_window: 2,
            tick_ms: 10,
        };
        Ok(Self {
            dir,
            config,
            store: ScriptedStore::default(),
        })
    }

    fn save_root(&self) -> &Path {
        &self.config.save_root
    }

    fn panel(&self, names: SaveNameStore, slot: SlotIndex) -> SavesPanel<ScriptedStore> {
        let mut options = HostOptions::default();
        options.save_slot = slot;
        SavesPanel::new(self.store.clone(), names.shared(), options, &self.config)
    }
}

async fn settle(panel: &mut SavesPanel<ScriptedStore>, dialogs: &mut Dialogs) -> Vec<SwitchEvent> {
    let mut events = Vec::new();
    for _ in 0..400 {
        if let Some(event) = panel.tick(dialogs) {
            events.push(event);
        }
        if !panel.is_scanning() {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("panel did not settle");
}

async fn first_rows(panel: &mut SavesPanel<ScriptedStore>, dialogs: &mut Dialogs) {
    for _ in 0..400 {
        panel.tick(dialogs);
        if !panel.slots().is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("first slot scan never finished");
}

async fn loaded_panel(
    fixture: &Fixture,
    names: SaveNameStore,
    slot: SlotIndex,
    dialogs: &mut Dialogs,
) -> SavesPanel<ScriptedStore> {
    let mut panel = fixture.panel(names, slot);
    fixture.store.finish(LoadResult::LoadedExistingFile);
    settle(&mut panel, dialogs).await;
    panel
}

#[tokio::test]
async fn list_follows_existing_slots_and_grows_from_the_tail() -> Result<()> {
    let fixture = Fixture::new(&["sav", "sav3", "sav6"])?;
    let mut dialogs = Dialogs::default();
    let mut panel = fixture.panel(SaveNameStore::default(), 0);

    assert!(panel.is_busy());
    assert!(matches!(panel.select_slot(2), Err(SlotError::Busy)));

    fixture.store.finish(LoadResult::LoadedExistingFile);
    let events = settle(&mut panel, &mut dialogs).await;
    assert!(matches!(events[0], SwitchEvent::Succeeded { slot: 0, .. }));
    assert!(!panel.is_busy());
    assert_eq!(panel.slots().len(), 7);
    let existing: Vec<bool> = panel.slots().items().iter().map(|row| row.exists).collect();
    assert_eq!(existing, vec![true, false, true, false, false, true, false]);
    assert_eq!(panel.cards().len(), 1);
    assert_eq!(panel.slots().items()[2].label(), "SAVE SLOT 3");

    let started = panel.select_slot(6)?;
    assert_eq!(
        started,
        Some(SwitchEvent::Started {
            previous: Some(0),
            target: 6
        })
    );
    assert_eq!(fixture.store.loads(), vec![0, 6]);
    fs::write(fixture.save_root().join("sav7"), "{}")?;
    fixture.store.finish(LoadResult::CreatedNewFile);
    settle(&mut panel, &mut dialogs).await;

    assert_eq!(panel.current_slot(), 6);
    assert_eq!(panel.slots().len(), 8);
    assert!(panel.slots().items()[6].exists);
    assert_eq!(panel.slots().selected(), Some(6));
    assert_eq!(panel.slots().visibility(7), RowVisibility::Visible(3));
    Ok(())
}

#[tokio::test]
async fn failed_load_reverts_with_a_single_dialog() -> Result<()> {
    let fixture = Fixture::new(&["sav", "sav4"])?;
    let mut dialogs = Dialogs::default();
    let mut panel = loaded_panel(&fixture, SaveNameStore::default(), 0, &mut dialogs).await;

    panel.select_slot(3)?;
    fixture
        .store
        .finish(LoadResult::ReadFailed(Some("unexpected end of file".to_string())));
    let events = settle(&mut panel, &mut dialogs).await;
    assert!(matches!(events[0], SwitchEvent::FailureReported { slot: 3, .. }));
    for _ in 0..3 {
        assert_eq!(panel.tick(&mut dialogs), Some(SwitchEvent::FailureSuppressed));
    }
    assert_eq!(dialogs.shown.len(), 1);
    assert!(dialogs.shown[0].message.contains("unexpected end of file"));
    assert!(panel.is_busy());

    let purpose = dialogs.close().expect("dialog shown");
    assert_eq!(
        panel.confirm_dialog(purpose),
        Some(SwitchEvent::Reverting { slot: 0 })
    );
    assert_eq!(fixture.store.loads(), vec![0, 3, 0]);

    fixture.store.finish(LoadResult::LoadedExistingFile);
    settle(&mut panel, &mut dialogs).await;
    assert_eq!(panel.current_slot(), 0);
    assert_eq!(panel.switch_state(), &SwitchState::Idle);
    assert_eq!(dialogs.shown.len(), 1);
    Ok(())
}

#[tokio::test]
async fn missing_slot_falls_back_to_slot_zero() -> Result<()> {
    let fixture = Fixture::new(&["sav"])?;
    let panel = fixture.panel(SaveNameStore::default(), 3);
    assert_eq!(panel.current_slot(), 0);
    assert_eq!(fixture.store.loads(), vec![0]);
    Ok(())
}

#[tokio::test]
async fn renaming_updates_row_and_switching_loads_names() -> Result<()> {
    let fixture = Fixture::new(&["sav", "sav2"])?;
    let mut names = SaveNameStore::default();
    names.set(1, "Hunter");
    let mut dialogs = Dialogs::default();
    let mut panel = loaded_panel(&fixture, names, 0, &mut dialogs).await;

    assert_eq!(panel.name_field(), "");
    panel.rename("Monk");
    assert_eq!(panel.slots().items()[0].label(), "Monk");
    assert_eq!(panel.names().read().get(0), Some("Monk"));

    panel.select_slot(1)?;
    assert_eq!(panel.name_field(), "Hunter");

    panel.rename("   ");
    assert_eq!(panel.names().read().get(1), None);
    Ok(())
}

#[tokio::test]
async fn reset_wipes_and_delete_recreates_the_slot() -> Result<()> {
    let fixture = Fixture::new(&["sav", "sav2", "expCore2", "exp2"])?;
    fs::create_dir_all(fixture.save_root().join("SJ_1"))?;
    let mut names = SaveNameStore::default();
    names.set(1, "Hunter");
    let mut dialogs = Dialogs::default();
    let mut panel = loaded_panel(&fixture, names, 1, &mut dialogs).await;

    assert_eq!(panel.confirm_reset(&mut dialogs)?, ResetOutcome::Wiped);
    assert_eq!(fixture.store.script.lock().wipes, 1);
    assert!(panel.cards().is_empty());
    settle(&mut panel, &mut dialogs).await;

    assert!(panel.toggle_delete());
    assert_eq!(panel.confirm_reset(&mut dialogs)?, ResetOutcome::Deleted);
    for name in ["expCore2", "exp2", "SJ_1"] {
        assert!(!fixture.save_root().join(name).exists(), "{name} kept");
    }
    assert_eq!(fixture.store.script.lock().deletes, 1);
    assert_eq!(panel.names().read().get(1), None);
    assert_eq!(panel.name_field(), "");
    assert_eq!(fixture.store.loads(), vec![1, 1]);
    assert!(panel.is_busy());
    assert!(dialogs.shown.is_empty());

    fixture.store.finish(LoadResult::CreatedNewFile);
    let events = settle(&mut panel, &mut dialogs).await;
    assert!(matches!(events[0], SwitchEvent::Succeeded { slot: 1, .. }));
    Ok(())
}

#[tokio::test]
async fn delete_failure_is_reported_without_reloading() -> Result<()> {
    let fixture = Fixture::new(&["sav"])?;
    let mut dialogs = Dialogs::default();
    let mut panel = loaded_panel(&fixture, SaveNameStore::default(), 0, &mut dialogs).await;
    fixture.store.script.lock().fail_delete = true;

    panel.toggle_delete();
    let err = panel.confirm_reset(&mut dialogs).unwrap_err();
    assert!(matches!(err, SlotError::Storage(_)));
    assert_eq!(dialogs.shown.len(), 1);
    assert_eq!(dialogs.shown[0].purpose, DialogPurpose::Notice);
    assert!(dialogs.shown[0].message.contains("locked"));
    assert_eq!(fixture.store.loads(), vec![0]);
    assert!(!panel.is_busy());

    assert!(panel.confirm_reset(&mut dialogs).is_err());
    assert_eq!(dialogs.shown.len(), 1);
    assert_eq!(panel.confirm_dialog(DialogPurpose::Notice), None);
    Ok(())
}

#[tokio::test]
async fn back_fires_on_pause_edge_and_saves_options() -> Result<()> {
    let fixture = Fixture::new(&["sav", "sav2"])?;
    let mut names = SaveNameStore::default();
    names.set(1, "Artificer");
    let mut dialogs = Dialogs::default();
    let mut panel = fixture.panel(names, 1);

    assert_eq!(panel.pause_input(true, &dialogs), None);
    assert_eq!(panel.pause_input(false, &dialogs), None);

    fixture.store.finish(LoadResult::LoadedExistingFile);
    settle(&mut panel, &mut dialogs).await;

    dialogs.open = true;
    assert_eq!(panel.pause_input(true, &dialogs), None);
    assert_eq!(panel.pause_input(false, &dialogs), None);
    dialogs.open = false;

    assert_eq!(panel.pause_input(true, &dialogs), Some(Screen::MainMenu));
    assert_eq!(panel.pause_input(true, &dialogs), None);

    let mut reloaded = SaveNameStore::default();
    let options = HostOptions::load(&fixture.config.options_file, &mut reloaded)?;
    assert_eq!(options.save_slot, 1);
    assert_eq!(reloaded.get(1), Some("Artificer"));
    assert!(fixture.dir.path().join("saves").join("options").exists());
    Ok(())
}

#[tokio::test]
async fn backups_stay_closed_while_a_load_is_pending() -> Result<()> {
    let fixture = Fixture::new(&["sav", "sav2"])?;
    let mut dialogs = Dialogs::default();
    let mut panel = loaded_panel(&fixture, SaveNameStore::default(), 0, &mut dialogs).await;
    let mut redirect = BackupsRedirect::default();

    panel.select_slot(1)?;
    assert!(matches!(
        panel.open_backups(&mut redirect),
        Err(SlotError::Busy)
    ));
    assert!(!redirect.is_armed());
    assert!(!fixture.config.options_file.exists());

    fixture.store.finish(LoadResult::LoadedExistingFile);
    settle(&mut panel, &mut dialogs).await;
    assert_eq!(panel.open_backups(&mut redirect)?, Screen::Backups);
    assert!(redirect.is_armed());
    assert_eq!(redirect.back_target(), Screen::Saves);
    assert!(fixture.config.options_file.exists());
    Ok(())
}

#[tokio::test]
async fn refresh_requested_mid_scan_runs_after_it() -> Result<()> {
    let fixture = Fixture::new(&["sav", "sav2"])?;
    let mut dialogs = Dialogs::default();
    let mut panel = fixture.panel(SaveNameStore::default(), 0);

    // The startup scan has not run yet when the load lands.
    fixture.store.finish(LoadResult::LoadedExistingFile);
    assert!(matches!(
        panel.tick(&mut dialogs),
        Some(SwitchEvent::Succeeded { slot: 0, .. })
    ));
    assert!(panel.is_scanning());

    first_rows(&mut panel, &mut dialogs).await;
    assert_eq!(panel.slots().len(), 3);
    assert!(panel.is_scanning());

    fs::write(fixture.save_root().join("sav5"), "{}")?;
    settle(&mut panel, &mut dialogs).await;
    assert_eq!(panel.slots().len(), 6);
    assert!(panel.slots().items()[4].exists);
    assert!(!panel.slots().items()[3].exists);
    Ok(())
}

#[tokio::test]
async fn full_rebuild_wins_over_color_only_refresh() -> Result<()> {
    let fixture = Fixture::new(&["sav", "sav2"])?;
    let mut dialogs = Dialogs::default();
    let mut panel = fixture.panel(SaveNameStore::default(), 0);

    fixture.store.finish(LoadResult::LoadedExistingFile);
    panel.tick(&mut dialogs);
    assert_eq!(panel.confirm_reset(&mut dialogs)?, ResetOutcome::Wiped);

    // Switching before any rows exist asks for a rebuild, the reset only
    // for a recolor. Both arrive while the startup scan is outstanding.
    panel.select_slot(1)?;
    fixture.store.finish(LoadResult::LoadedExistingFile);
    assert!(matches!(
        panel.tick(&mut dialogs),
        Some(SwitchEvent::Succeeded { slot: 1, .. })
    ));
    assert_eq!(panel.confirm_reset(&mut dialogs)?, ResetOutcome::Wiped);
    assert!(panel.is_scanning());

    first_rows(&mut panel, &mut dialogs).await;
    assert_eq!(panel.slots().items()[0].label(), "SAVE SLOT 1");
    panel.names().write().set(0, "Saint");
    settle(&mut panel, &mut dialogs).await;
    assert_eq!(panel.slots().len(), 3);
    assert_eq!(panel.slots().items()[0].label(), "Saint");

    // A recolor on its own keeps the rows as they are.
    panel.names().write().set(1, "Pilgrim");
    assert_eq!(panel.confirm_reset(&mut dialogs)?, ResetOutcome::Wiped);
    settle(&mut panel, &mut dialogs).await;
    assert_eq!(panel.slots().items()[1].label(), "SAVE SLOT 2");
    assert_eq!(fixture.store.script.lock().wipes, 3);
    Ok(())
}
