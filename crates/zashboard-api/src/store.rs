//! Client-side dashboard state.
//!
//! [`DashboardState`] owns the current configuration plus the purely local
//! view state (active room, edit mode, object under edit). Every field is a
//! [`watch`] channel, so any number of views can subscribe and re-render on
//! change. Mutations that touch persisted state schedule a debounced save
//! through a [`DashboardBackend`].
//!
//! The debounce timer runs on the ambient tokio runtime, so mutating
//! operations must be called from within one.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::DashboardBackend;
use crate::dashboard::{
    DashboardConfig, DashboardObject, DashboardRoom, DashboardSidebar, EditingObjectState,
    ObjectType, next_id,
};

pub struct DashboardState {
    backend: Arc<dyn DashboardBackend>,
    config: watch::Sender<DashboardConfig>,
    edit_mode: watch::Sender<bool>,
    active_room_id: watch::Sender<Option<String>>,
    editing_object: watch::Sender<Option<EditingObjectState>>,
    save_timer: Mutex<Option<JoinHandle<()>>>,
}

impl DashboardState {
    pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(300);

    #[must_use]
    pub fn new(backend: Arc<dyn DashboardBackend>) -> Self {
        Self {
            backend,
            config: watch::Sender::new(DashboardConfig::default()),
            edit_mode: watch::Sender::new(false),
            active_room_id: watch::Sender::new(None),
            editing_object: watch::Sender::new(None),
            save_timer: Mutex::new(None),
        }
    }

    /// Fetch the configuration from the backend and select the first room.
    /// A failed fetch falls back to the default template.
    pub async fn load(&self) {
        let config = match self.backend.load().await {
            Ok(config) => config,
            Err(err) => {
                log::error!("Failed to load dashboard config: {err}");
                DashboardConfig::default()
            }
        };

        let first_room = config.rooms.first().map(|room| room.id.clone());
        self.config.send_replace(config);
        self.active_room_id.send_replace(first_room);
    }

    fn schedule_save(&self) {
        let mut timer = self
            .save_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(pending) = timer.take() {
            pending.abort();
        }

        let backend = self.backend.clone();
        let config = self.config.subscribe();

        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Self::SAVE_DEBOUNCE).await;

            let snapshot = config.borrow().clone();

            // detached, so a later reschedule only cancels the timer
            tokio::spawn(async move {
                if let Err(err) = backend.save(&snapshot).await {
                    log::error!("Failed to save dashboard: {err}");
                }
            });
        }));
    }

    /// Apply `mutator` to the room list. It returns whether anything
    /// changed; only then are subscribers notified and a save scheduled.
    fn update_rooms(&self, mutator: impl FnOnce(&mut Vec<DashboardRoom>) -> bool) -> bool {
        let changed = self.config.send_if_modified(|cfg| mutator(&mut cfg.rooms));
        if changed {
            self.schedule_save();
        }
        changed
    }

    pub fn set_edit_mode(&self, value: bool) {
        self.edit_mode.send_replace(value);
    }

    pub fn toggle_edit_mode(&self) {
        self.edit_mode.send_modify(|mode| *mode = !*mode);
    }

    pub fn set_active_room(&self, room_id: &str) {
        self.active_room_id.send_replace(Some(room_id.to_string()));
    }

    pub fn update_object_position(&self, room_id: &str, object_id: &str, x: f64, y: f64) -> bool {
        self.update_rooms(|rooms| {
            let Some(obj) = rooms
                .iter_mut()
                .find(|room| room.id == room_id)
                .and_then(|room| room.object_mut(object_id))
            else {
                return false;
            };
            obj.set_position(x, y);
            true
        })
    }

    pub fn start_creating_object(&self, room_id: &str, otype: ObjectType) {
        self.editing_object.send_replace(Some(EditingObjectState {
            room_id: room_id.to_string(),
            object: DashboardObject::new(otype),
            is_new: true,
        }));
    }

    /// Stage a copy of an existing object for editing. Unknown room or
    /// object ids leave the current edit untouched.
    pub fn start_editing_object(&self, room_id: &str, object_id: &str) {
        let object = self
            .config
            .borrow()
            .room(room_id)
            .and_then(|room| room.object(object_id))
            .cloned();

        if let Some(object) = object {
            self.editing_object.send_replace(Some(EditingObjectState {
                room_id: room_id.to_string(),
                object,
                is_new: false,
            }));
        }
    }

    pub fn cancel_editing_object(&self) {
        self.editing_object.send_replace(None);
    }

    /// Commit a staged object: appended when new, otherwise replacing every
    /// object with the same id. The staging area is cleared either way.
    pub fn save_editing_object(&self, payload: EditingObjectState) {
        let EditingObjectState {
            room_id,
            mut object,
            is_new,
        } = payload;

        if object.id().is_empty() {
            object.set_id(next_id("object"));
        }

        self.update_rooms(|rooms| {
            let Some(room) = rooms.iter_mut().find(|room| room.id == room_id) else {
                return false;
            };

            if is_new {
                room.objects.push(object);
                return true;
            }

            let mut replaced = false;
            for slot in room.objects.iter_mut().filter(|obj| obj.id() == object.id()) {
                *slot = object.clone();
                replaced = true;
            }
            replaced
        });

        self.editing_object.send_replace(None);
    }

    /// Remove an object, and drop the in-flight edit if it refers to the
    /// very same object in the very same room.
    pub fn remove_object(&self, room_id: &str, object_id: &str) {
        self.update_rooms(|rooms| {
            let Some(room) = rooms.iter_mut().find(|room| room.id == room_id) else {
                return false;
            };
            let before = room.objects.len();
            room.objects.retain(|obj| obj.id() != object_id);
            room.objects.len() != before
        });

        self.editing_object.send_if_modified(|editing| {
            let matches = editing
                .as_ref()
                .is_some_and(|e| e.room_id == room_id && e.object.id() == object_id);
            if matches {
                *editing = None;
            }
            matches
        });
    }

    #[must_use]
    pub fn config(&self) -> DashboardConfig {
        self.config.borrow().clone()
    }

    #[must_use]
    pub fn sidebar(&self) -> DashboardSidebar {
        self.config.borrow().sidebar.clone()
    }

    #[must_use]
    pub fn rooms(&self) -> Vec<DashboardRoom> {
        self.config.borrow().rooms.clone()
    }

    #[must_use]
    pub fn edit_mode(&self) -> bool {
        *self.edit_mode.borrow()
    }

    #[must_use]
    pub fn active_room_id(&self) -> Option<String> {
        self.active_room_id.borrow().clone()
    }

    #[must_use]
    pub fn active_room(&self) -> Option<DashboardRoom> {
        let room_id = self.active_room_id.borrow();
        let config = self.config.borrow();
        room_id
            .as_deref()
            .and_then(|id| config.room(id))
            .cloned()
    }

    #[must_use]
    pub fn editing_object(&self) -> Option<EditingObjectState> {
        self.editing_object.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_config(&self) -> watch::Receiver<DashboardConfig> {
        self.config.subscribe()
    }

    #[must_use]
    pub fn subscribe_edit_mode(&self) -> watch::Receiver<bool> {
        self.edit_mode.subscribe()
    }

    #[must_use]
    pub fn subscribe_active_room_id(&self) -> watch::Receiver<Option<String>> {
        self.active_room_id.subscribe()
    }

    #[must_use]
    pub fn subscribe_editing_object(&self) -> watch::Receiver<Option<EditingObjectState>> {
        self.editing_object.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::client::DashboardBackend;
    use crate::dashboard::{
        ButtonObject, DashboardConfig, DashboardObject, DashboardRoom, EditingObjectState,
        ObjectType,
    };
    use crate::error::{ZashboardError, ZashboardResult};
    use crate::store::DashboardState;

    #[derive(Default)]
    struct FakeBackend {
        stored: Option<DashboardConfig>,
        saves: Mutex<Vec<DashboardConfig>>,
    }

    #[async_trait]
    impl DashboardBackend for FakeBackend {
        async fn load(&self) -> ZashboardResult<DashboardConfig> {
            self.stored
                .clone()
                .ok_or_else(|| ZashboardError::ServerError("HTTP 500".to_string()))
        }

        async fn save(&self, config: &DashboardConfig) -> ZashboardResult<()> {
            self.saves.lock().unwrap().push(config.clone());
            Ok(())
        }
    }

    impl FakeBackend {
        fn save_count(&self) -> usize {
            self.saves.lock().unwrap().len()
        }

        fn last_save(&self) -> DashboardConfig {
            self.saves.lock().unwrap().last().cloned().unwrap()
        }
    }

    fn button(id: &str) -> DashboardObject {
        let mut button = ButtonObject::new_unbound();
        button.id = id.to_string();
        DashboardObject::Button(button)
    }

    fn stored_config() -> DashboardConfig {
        let mut cfg = DashboardConfig::default();
        cfg.rooms[0].objects = vec![button("lamp"), button("fan")];
        cfg.rooms.push(DashboardRoom {
            id: "office".to_string(),
            title: "Office".to_string(),
            icon: None,
            description: None,
            objects: vec![button("lamp")],
        });
        cfg
    }

    async fn loaded() -> (Arc<FakeBackend>, DashboardState) {
        let backend = Arc::new(FakeBackend {
            stored: Some(stored_config()),
            ..FakeBackend::default()
        });
        let state = DashboardState::new(backend.clone());
        state.load().await;
        (backend, state)
    }

    async fn settle() {
        tokio::time::sleep(DashboardState::SAVE_DEBOUNCE + Duration::from_millis(50)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn load_selects_first_room() {
        let (_backend, state) = loaded().await;

        assert_eq!(state.active_room_id().as_deref(), Some("living-room"));
        assert_eq!(state.active_room().unwrap().objects.len(), 2);
        assert_eq!(state.rooms().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_load_falls_back_to_default() {
        let backend = Arc::new(FakeBackend::default());
        let state = DashboardState::new(backend.clone());
        state.load().await;

        assert_eq!(state.config(), DashboardConfig::default());
        assert_eq!(state.active_room_id().as_deref(), Some("living-room"));
        assert_eq!(backend.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn set_active_room_does_not_save() {
        let (backend, state) = loaded().await;

        state.set_active_room("office");
        state.toggle_edit_mode();
        settle().await;

        assert_eq!(state.active_room().unwrap().title, "Office");
        assert!(state.edit_mode());
        assert_eq!(backend.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn saves_are_debounced() {
        let (backend, state) = loaded().await;

        assert!(state.update_object_position("living-room", "lamp", 1.0, 1.0));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(state.update_object_position("living-room", "lamp", 2.0, 2.0));
        tokio::time::sleep(Duration::from_millis(200)).await;

        // the second call restarted the timer
        assert_eq!(backend.save_count(), 0);

        assert!(state.update_object_position("living-room", "lamp", 3.0, 4.0));
        settle().await;

        assert_eq!(backend.save_count(), 1);
        let saved = backend.last_save();
        let DashboardObject::Button(lamp) = saved.rooms[0].object("lamp").unwrap();
        assert!((lamp.x - 3.0).abs() < f64::EPSILON);
        assert!((lamp.y - 4.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_position_target_is_ignored() {
        let (backend, state) = loaded().await;

        assert!(!state.update_object_position("garage", "lamp", 1.0, 1.0));
        assert!(!state.update_object_position("living-room", "heater", 1.0, 1.0));
        settle().await;

        assert_eq!(backend.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn create_then_save_appends() {
        let (backend, state) = loaded().await;

        state.start_creating_object("office", ObjectType::Button);
        let editing = state.editing_object().unwrap();
        assert!(editing.is_new);
        assert!(editing.object.id().starts_with("button-"));

        state.save_editing_object(editing.clone());
        settle().await;

        assert!(state.editing_object().is_none());
        let office = backend.last_save().room("office").cloned().unwrap();
        assert_eq!(office.objects.len(), 2);
        assert_eq!(office.objects[1], editing.object);
    }

    #[tokio::test(start_paused = true)]
    async fn save_generates_missing_id() {
        let (_backend, state) = loaded().await;

        state.save_editing_object(EditingObjectState {
            room_id: "bedroom".to_string(),
            object: button(""),
            is_new: true,
        });

        let bedroom = state.config().room("bedroom").cloned().unwrap();
        assert!(bedroom.objects[0].id().starts_with("object-"));
    }

    #[tokio::test(start_paused = true)]
    async fn edit_then_save_replaces() {
        let (_backend, state) = loaded().await;

        state.start_editing_object("living-room", "fan");
        let mut editing = state.editing_object().unwrap();
        assert!(!editing.is_new);

        let DashboardObject::Button(fan) = &mut editing.object;
        fan.name = "Ceiling fan".to_string();
        state.save_editing_object(editing);

        let room = state.config().room("living-room").cloned().unwrap();
        assert_eq!(room.objects.len(), 2);
        let DashboardObject::Button(fan) = room.object("fan").unwrap();
        assert_eq!(fan.name, "Ceiling fan");
    }

    #[tokio::test(start_paused = true)]
    async fn start_editing_unknown_object_keeps_state() {
        let (_backend, state) = loaded().await;

        state.start_editing_object("living-room", "nope");
        assert!(state.editing_object().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_clears_editing() {
        let (_backend, state) = loaded().await;

        state.start_creating_object("office", ObjectType::Button);
        state.cancel_editing_object();

        assert!(state.editing_object().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn remove_clears_matching_edit() {
        let (backend, state) = loaded().await;

        state.start_editing_object("living-room", "lamp");
        state.remove_object("living-room", "lamp");
        settle().await;

        assert!(state.editing_object().is_none());
        assert!(backend.last_save().rooms[0].object("lamp").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn remove_keeps_unrelated_edit() {
        let (_backend, state) = loaded().await;

        // same object id, different room
        state.start_editing_object("office", "lamp");
        state.remove_object("living-room", "lamp");
        assert!(state.editing_object().is_some());

        // same room, different object
        state.remove_object("office", "fan");
        assert!(state.editing_object().is_some());

        state.remove_object("office", "lamp");
        assert!(state.editing_object().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_changes() {
        let (_backend, state) = loaded().await;
        let mut rx = state.subscribe_config();
        rx.mark_unchanged();

        state.remove_object("living-room", "fan");

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().rooms[0].objects.len(), 1);
    }
}
