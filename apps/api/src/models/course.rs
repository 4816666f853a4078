use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A generated course, exactly as the model returned it.
///
/// Only `courseTitle` and `modules` are guaranteed present. Nested data is
/// passed through untouched; `outline()` offers a best-effort typed view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseDocument(Map<String, Value>);

impl CourseDocument {
    pub fn from_object(object: Map<String, Value>) -> Self {
        Self(object)
    }

    /// `None` if the title is present but not a string.
    pub fn course_title(&self) -> Option<&str> {
        self.0.get("courseTitle").and_then(Value::as_str)
    }

    pub fn modules(&self) -> &Value {
        self.0.get("modules").unwrap_or(&Value::Null)
    }

    /// Typed modules, or `None` when the nested shape does not fit.
    pub fn outline(&self) -> Option<Vec<Module>> {
        Vec::<Module>::deserialize(self.modules()).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Module {
    pub module_title: String,
    pub description: String,
    pub lessons: Vec<Lesson>,
    pub quizzes: Vec<Quiz>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Lesson {
    pub lesson_title: String,
    pub content: String,
    pub duration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Quiz {
    pub question: String,
    /// Four options by convention; not enforced.
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}
