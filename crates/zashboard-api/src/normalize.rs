//! Repair of untrusted dashboard documents.
//!
//! Input is whatever came out of a YAML file or a JSON request body. The
//! only structural requirement is an object with an array-valued `rooms`
//! field; everything below that is defaulted field by field.

use serde_json::{Map, Value};

use crate::dashboard::{
    ButtonObject, DashboardConfig, DashboardObject, DashboardRoom, DashboardSidebar,
};

/// Non-empty string, or `None`.
fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|x| !x.is_empty())
        .map(ToString::to_string)
}

/// Identifier: a non-empty string, or a number or bool written in its
/// plain form, as hand-edited YAML often has them.
fn id_text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        Value::Bool(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Any string, including the empty one.
fn opt_text(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(ToString::to_string)
}

fn number(map: &Map<String, Value>, key: &str, default: f64) -> f64 {
    map.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn normalize_sidebar(raw: Option<&Value>) -> DashboardSidebar {
    let empty = Map::new();
    let map = raw.and_then(Value::as_object).unwrap_or(&empty);

    DashboardSidebar {
        title: text(map, "title").unwrap_or_else(|| DashboardSidebar::DEFAULT_TITLE.to_string()),
        subtitle: opt_text(map, "subtitle"),
        logo: Some(text(map, "logo").unwrap_or_else(|| DashboardSidebar::DEFAULT_LOGO.to_string())),
    }
}

/// Normalize one object entry.
///
/// Entries without a `type` become buttons. Entries naming any other type,
/// and entries that are not objects at all, are dropped.
#[must_use]
pub fn normalize_object(raw: &Value, index: usize) -> Option<DashboardObject> {
    let map = raw.as_object()?;

    match map.get("type") {
        None | Some(Value::Null) => {}
        Some(Value::String(otype)) if otype == "button" => {}
        Some(other) => {
            log::debug!("Dropping dashboard object of unsupported type {other}");
            return None;
        }
    }

    Some(DashboardObject::Button(ButtonObject {
        id: id_text(map, "id").unwrap_or_else(|| format!("object-{}", index + 1)),
        entity: text(map, "entity").unwrap_or_default(),
        name: text(map, "name").unwrap_or_else(|| ButtonObject::DEFAULT_NAME.to_string()),
        state: opt_text(map, "state"),
        icon: opt_text(map, "icon"),
        color: text(map, "color").unwrap_or_else(|| ButtonObject::DEFAULT_COLOR.to_string()),
        service: text(map, "service").unwrap_or_default(),
        show_info: map.get("showInfo").and_then(Value::as_bool).unwrap_or(true),
        x: number(map, "x", ButtonObject::DEFAULT_X),
        y: number(map, "y", ButtonObject::DEFAULT_Y),
        width: number(map, "width", ButtonObject::DEFAULT_WIDTH),
        height: number(map, "height", ButtonObject::DEFAULT_HEIGHT),
    }))
}

/// Normalize one room entry. A room that is not an object at all gets
/// nothing but positional defaults.
#[must_use]
pub fn normalize_room(raw: &Value, index: usize) -> DashboardRoom {
    let empty = Map::new();
    let map = raw.as_object().unwrap_or(&empty);

    let objects = map
        .get("objects")
        .and_then(Value::as_array)
        .map(|objects| {
            objects
                .iter()
                .enumerate()
                .filter_map(|(idx, obj)| normalize_object(obj, idx))
                .collect()
        })
        .unwrap_or_default();

    DashboardRoom {
        id: id_text(map, "id").unwrap_or_else(|| format!("room-{}", index + 1)),
        title: text(map, "title").unwrap_or_else(|| format!("Room {}", index + 1)),
        icon: opt_text(map, "icon"),
        description: opt_text(map, "description"),
        objects,
    }
}

/// Turn an arbitrary document into a dashboard configuration.
///
/// Returns `None` when `raw` is not an object, or has no array-valued
/// `rooms` field. The caller decides what to substitute.
#[must_use]
pub fn normalize(raw: &Value) -> Option<DashboardConfig> {
    let map = raw.as_object()?;
    let rooms = map.get("rooms")?.as_array()?;

    Some(DashboardConfig {
        sidebar: normalize_sidebar(map.get("sidebar")),
        rooms: rooms
            .iter()
            .enumerate()
            .map(|(index, room)| normalize_room(room, index))
            .collect(),
    })
}
