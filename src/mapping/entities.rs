use chrono::NaiveDate;
use serde::Serialize;

use crate::classify::taxonomy::TextCategory;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub id: i64,
    pub device_id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Guide {
    pub id: i64,
    pub device_id: Option<i64>,
    pub title: String,
    pub created_date: NaiveDate,
    pub url: Option<String>,
    pub category: TextCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub id: i64,
    pub guide_id: i64,
    pub step_number: u32,
    pub description: String,
}

/// The four-entity relational view of one mapping run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MappedSchema {
    pub devices: Vec<Device>,
    pub components: Vec<Component>,
    pub guides: Vec<Guide>,
    pub steps: Vec<Step>,
}

impl MappedSchema {
    pub fn steps_for(&self, guide_id: i64) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.guide_id == guide_id)
    }
}
