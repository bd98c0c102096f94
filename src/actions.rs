use serde::Serialize;

use crate::forum::{Comment, ContentAction, Thread, ThreadType};

/// Content fields an action descriptor may match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Pinned,
    Endorsed,
    Closed,
    AbuseFlagged,
    CanDelete,
    PostType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Bool(bool),
    Type(ThreadType),
}

/// A static rule stating when one variant of an action applies. One action
/// can have multiple mutually exclusive entries (such as close/reopen) whose
/// conditions never hold for the same content state.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ActionDescriptor {
    pub id: &'static str,
    pub action: ContentAction,
    pub label: &'static str,
    pub label_id: &'static str,
    /// Field values the content must carry for this variant to apply; every
    /// listed field must match. Empty means the variant always applies.
    pub conditions: &'static [(ConditionField, ConditionValue)],
}

use self::ConditionField as F;
use self::ConditionValue as V;

pub const ACTIONS_LIST: &[ActionDescriptor] = &[
    ActionDescriptor {
        id: "edit",
        action: ContentAction::Edit,
        label: "Edit",
        label_id: "discussions.actions.edit",
        conditions: &[],
    },
    ActionDescriptor {
        id: "pin",
        action: ContentAction::Pin,
        label: "Pin",
        label_id: "discussions.actions.pin",
        conditions: &[(F::Pinned, V::Bool(false))],
    },
    ActionDescriptor {
        id: "unpin",
        action: ContentAction::Pin,
        label: "Unpin",
        label_id: "discussions.actions.unpin",
        conditions: &[(F::Pinned, V::Bool(true))],
    },
    ActionDescriptor {
        id: "endorse",
        action: ContentAction::Endorse,
        label: "Endorse",
        label_id: "discussions.actions.endorse",
        conditions: &[
            (F::Endorsed, V::Bool(false)),
            (F::PostType, V::Type(ThreadType::Discussion)),
        ],
    },
    ActionDescriptor {
        id: "unendorse",
        action: ContentAction::Endorse,
        label: "Unendorse",
        label_id: "discussions.actions.unendorse",
        conditions: &[
            (F::Endorsed, V::Bool(true)),
            (F::PostType, V::Type(ThreadType::Discussion)),
        ],
    },
    ActionDescriptor {
        id: "answer",
        action: ContentAction::Endorse,
        label: "Mark as answered",
        label_id: "discussions.actions.answer",
        conditions: &[
            (F::Endorsed, V::Bool(false)),
            (F::PostType, V::Type(ThreadType::Question)),
        ],
    },
    ActionDescriptor {
        id: "unanswer",
        action: ContentAction::Endorse,
        label: "Unmark as answered",
        label_id: "discussions.actions.unanswer",
        conditions: &[
            (F::Endorsed, V::Bool(true)),
            (F::PostType, V::Type(ThreadType::Question)),
        ],
    },
    ActionDescriptor {
        id: "close",
        action: ContentAction::Close,
        label: "Close",
        label_id: "discussions.actions.close",
        conditions: &[(F::Closed, V::Bool(false))],
    },
    ActionDescriptor {
        id: "reopen",
        action: ContentAction::Close,
        label: "Reopen",
        label_id: "discussions.actions.reopen",
        conditions: &[(F::Closed, V::Bool(true))],
    },
    ActionDescriptor {
        id: "report",
        action: ContentAction::Report,
        label: "Report",
        label_id: "discussions.actions.report",
        conditions: &[(F::AbuseFlagged, V::Bool(false))],
    },
    ActionDescriptor {
        id: "unreport",
        action: ContentAction::Report,
        label: "Unreport",
        label_id: "discussions.actions.unreport",
        conditions: &[(F::AbuseFlagged, V::Bool(true))],
    },
    ActionDescriptor {
        id: "delete",
        action: ContentAction::Delete,
        label: "Delete",
        label_id: "discussions.actions.delete",
        conditions: &[(F::CanDelete, V::Bool(true))],
    },
];

/// Content the resolver can inspect: threads and comments both qualify.
/// `field` returns `None` for fields a content kind does not carry, which
/// simply fails the condition instead of erroring.
pub trait Actionable {
    fn editable_fields(&self) -> &[ContentAction];
    fn field(&self, field: ConditionField) -> Option<ConditionValue>;
}

impl Actionable for Thread {
    fn editable_fields(&self) -> &[ContentAction] {
        &self.editable_fields
    }

    fn field(&self, field: ConditionField) -> Option<ConditionValue> {
        match field {
            ConditionField::Pinned => Some(ConditionValue::Bool(self.pinned)),
            ConditionField::Endorsed => Some(ConditionValue::Bool(self.endorsed)),
            ConditionField::Closed => Some(ConditionValue::Bool(self.closed)),
            ConditionField::AbuseFlagged => Some(ConditionValue::Bool(self.abuse_flagged)),
            ConditionField::CanDelete => Some(ConditionValue::Bool(self.can_delete)),
            ConditionField::PostType => Some(ConditionValue::Type(self.thread_type)),
        }
    }
}

impl Actionable for Comment {
    fn editable_fields(&self) -> &[ContentAction] {
        &self.editable_fields
    }

    fn field(&self, field: ConditionField) -> Option<ConditionValue> {
        match field {
            ConditionField::Endorsed => Some(ConditionValue::Bool(self.endorsed)),
            ConditionField::AbuseFlagged => Some(ConditionValue::Bool(self.abuse_flagged)),
            ConditionField::CanDelete => Some(ConditionValue::Bool(self.can_delete)),
            // Comments are never pinned or closed and carry no post type.
            ConditionField::Pinned | ConditionField::Closed | ConditionField::PostType => None,
        }
    }
}

/// Check whether the user may perform `action` on this content, per the
/// server-computed `editable_fields` snapshot. Delete is the documented
/// exception: its gating lives on `can_delete`, not in `editable_fields`.
pub fn check_permissions(content: &dyn Actionable, action: ContentAction) -> bool {
    if content.editable_fields().contains(&action) {
        return true;
    }
    action == ContentAction::Delete
}

/// True when every listed field of the content matches the required value.
/// Missing fields never match.
pub fn matches_conditions(
    content: &dyn Actionable,
    conditions: &[(ConditionField, ConditionValue)],
) -> bool {
    conditions
        .iter()
        .all(|(field, required)| content.field(*field) == Some(*required))
}

/// The subset of `ACTIONS_LIST` currently legal for this content, in table
/// order. Both the permission check and the state conditions must hold.
pub fn eligible_actions(content: &dyn Actionable) -> Vec<&'static ActionDescriptor> {
    ACTIONS_LIST
        .iter()
        .filter(|descriptor| {
            check_permissions(content, descriptor.action)
                && matches_conditions(content, descriptor.conditions)
        })
        .collect()
}
