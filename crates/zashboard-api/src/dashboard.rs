use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DashboardConfig {
    pub sidebar: DashboardSidebar,
    pub rooms: Vec<DashboardRoom>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardSidebar {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DashboardRoom {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub objects: Vec<DashboardObject>,
}

/// Widget placed inside a room. The wire format carries the variant in a
/// `type` field.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardObject {
    Button(ButtonObject),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Button,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ButtonObject {
    pub id: String,
    pub entity: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub color: String,
    pub service: String,
    pub show_info: bool,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Staging area for an object being created or edited. Never persisted
/// until handed back to the store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditingObjectState {
    pub room_id: String,
    pub object: DashboardObject,
    #[serde(default)]
    pub is_new: bool,
}

impl ButtonObject {
    pub const DEFAULT_NAME: &'static str = "Button";
    pub const DEFAULT_COLOR: &'static str = "#ffde16";
    pub const DEFAULT_ICON: &'static str = "mdi:gesture-tap-button";
    pub const DEFAULT_X: f64 = 40.0;
    pub const DEFAULT_Y: f64 = 40.0;
    pub const DEFAULT_WIDTH: f64 = 180.0;
    pub const DEFAULT_HEIGHT: f64 = 120.0;

    /// A freshly created, not yet bound button.
    #[must_use]
    pub fn new_unbound() -> Self {
        Self {
            id: next_id("button"),
            entity: String::new(),
            name: "New button".to_string(),
            state: None,
            icon: Some(Self::DEFAULT_ICON.to_string()),
            color: Self::DEFAULT_COLOR.to_string(),
            service: String::new(),
            show_info: true,
            x: Self::DEFAULT_X,
            y: Self::DEFAULT_Y,
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
        }
    }
}

impl DashboardObject {
    #[must_use]
    pub fn new(otype: ObjectType) -> Self {
        match otype {
            ObjectType::Button => Self::Button(ButtonObject::new_unbound()),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Button(button) => &button.id,
        }
    }

    pub fn set_id(&mut self, id: String) {
        match self {
            Self::Button(button) => button.id = id,
        }
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        match self {
            Self::Button(button) => {
                button.x = x;
                button.y = y;
            }
        }
    }
}

impl DashboardSidebar {
    pub const DEFAULT_TITLE: &'static str = "Zashboard";
    pub const DEFAULT_SUBTITLE: &'static str = "Fusion-inspired Home Assistant UI";
    pub const DEFAULT_LOGO: &'static str = "Z";
}

impl Default for DashboardSidebar {
    fn default() -> Self {
        Self {
            title: Self::DEFAULT_TITLE.to_string(),
            subtitle: Some(Self::DEFAULT_SUBTITLE.to_string()),
            logo: Some(Self::DEFAULT_LOGO.to_string()),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            sidebar: DashboardSidebar::default(),
            rooms: vec![
                DashboardRoom {
                    id: "living-room".to_string(),
                    title: "Living room".to_string(),
                    icon: Some("mdi:sofa".to_string()),
                    description: Some("Favorite controls for the living room".to_string()),
                    objects: vec![],
                },
                DashboardRoom {
                    id: "bedroom".to_string(),
                    title: "Bedroom".to_string(),
                    icon: Some("mdi:bed-queen".to_string()),
                    description: Some("Night lights and scenes".to_string()),
                    objects: vec![],
                },
            ],
        }
    }
}

impl DashboardConfig {
    #[must_use]
    pub fn room(&self, room_id: &str) -> Option<&DashboardRoom> {
        self.rooms.iter().find(|room| room.id == room_id)
    }
}

impl DashboardRoom {
    #[must_use]
    pub fn object(&self, object_id: &str) -> Option<&DashboardObject> {
        self.objects.iter().find(|obj| obj.id() == object_id)
    }

    pub fn object_mut(&mut self, object_id: &str) -> Option<&mut DashboardObject> {
        self.objects.iter_mut().find(|obj| obj.id() == object_id)
    }
}

/// Random short identifier of the form `<prefix>-xxxxxxx` (base36).
#[must_use]
pub fn next_id(prefix: &str) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    const LEN: usize = 7;

    let mut rng = rand::rng();
    let suffix: String = (0..LEN)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect();

    format!("{prefix}-{suffix}")
}
