//! # Document head model.
//!
//! ## Rules
//! - at most one script element per `src` (scripts are page-scoped and never
//!   removed after a successful load);
//! - at most one stylesheet element per element id (stylesheets are
//!   mount-scoped and removed by their owner only).

use parking_lot::Mutex;

use crate::mount::MountId;

/// Stylesheet element injected for a remote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StylesheetRecord {
    /// Deterministic element id derived from the remote name.
    pub link_element_id: String,
    /// Stylesheet URL.
    pub href: String,
    /// Remote the stylesheet belongs to.
    pub remote_name: String,
    /// Mount that created (and may remove) the element.
    pub owner: MountId,
}

/// Element in the document head.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Element {
    /// Remote entry script.
    Script {
        /// Entry URL.
        src: String,
    },
    /// Remote stylesheet link.
    Stylesheet(StylesheetRecord),
}

/// The page head shared by the host and every remote.
#[derive(Debug, Default)]
pub struct Document {
    head: Mutex<Vec<Element>>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a script element with this `src` exists.
    pub fn has_script(&self, src: &str) -> bool {
        self.head
            .lock()
            .iter()
            .any(|e| matches!(e, Element::Script { src: s } if s == src))
    }

    /// Appends a script element unless one with the same `src` exists.
    ///
    /// Returns `true` if the element was appended.
    pub fn append_script(&self, src: &str) -> bool {
        let mut head = self.head.lock();
        if head
            .iter()
            .any(|e| matches!(e, Element::Script { src: s } if s == src))
        {
            return false;
        }
        head.push(Element::Script {
            src: src.to_string(),
        });
        true
    }

    /// Removes the script element with this `src`.
    pub fn remove_script(&self, src: &str) -> bool {
        let mut head = self.head.lock();
        let before = head.len();
        head.retain(|e| !matches!(e, Element::Script { src: s } if s == src));
        head.len() != before
    }

    /// Sources of all script elements, in insertion order.
    pub fn scripts(&self) -> Vec<String> {
        self.head
            .lock()
            .iter()
            .filter_map(|e| match e {
                Element::Script { src } => Some(src.clone()),
                Element::Stylesheet(_) => None,
            })
            .collect()
    }

    /// Stylesheet element with this id, if any.
    pub fn stylesheet(&self, id: &str) -> Option<StylesheetRecord> {
        self.head.lock().iter().find_map(|e| match e {
            Element::Stylesheet(rec) if rec.link_element_id == id => Some(rec.clone()),
            _ => None,
        })
    }

    /// Inserts a stylesheet element unless one with the same id exists.
    ///
    /// Returns `true` if the element was inserted.
    pub fn insert_stylesheet(&self, rec: StylesheetRecord) -> bool {
        let mut head = self.head.lock();
        let exists = head.iter().any(
            |e| matches!(e, Element::Stylesheet(r) if r.link_element_id == rec.link_element_id),
        );
        if exists {
            return false;
        }
        head.push(Element::Stylesheet(rec));
        true
    }

    /// Removes the stylesheet element with this id if `owner` created it.
    pub fn remove_stylesheet(&self, id: &str, owner: MountId) -> Option<StylesheetRecord> {
        let mut head = self.head.lock();
        let pos = head.iter().position(
            |e| matches!(e, Element::Stylesheet(r) if r.link_element_id == id && r.owner == owner),
        )?;
        match head.remove(pos) {
            Element::Stylesheet(rec) => Some(rec),
            Element::Script { .. } => None,
        }
    }

    /// All stylesheet elements, in insertion order.
    pub fn stylesheets(&self) -> Vec<StylesheetRecord> {
        self.head
            .lock()
            .iter()
            .filter_map(|e| match e {
                Element::Stylesheet(rec) => Some(rec.clone()),
                Element::Script { .. } => None,
            })
            .collect()
    }

    /// Snapshot of the whole head.
    pub fn elements(&self) -> Vec<Element> {
        self.head.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(owner: u64) -> StylesheetRecord {
        StylesheetRecord {
            link_element_id: "toolA-stylesheet".into(),
            href: "http://h/static/css/main.css".into(),
            remote_name: "toolA".into(),
            owner: MountId::from_raw(owner),
        }
    }

    #[test]
    fn scripts_are_unique_by_src() {
        let doc = Document::new();
        assert!(doc.append_script("http://h/remoteEntry.js"));
        assert!(!doc.append_script("http://h/remoteEntry.js"));
        assert_eq!(doc.scripts().len(), 1);
        assert!(doc.remove_script("http://h/remoteEntry.js"));
        assert!(!doc.has_script("http://h/remoteEntry.js"));
    }

    #[test]
    fn only_owner_removes_stylesheet() {
        let doc = Document::new();
        assert!(doc.insert_stylesheet(sheet(1)));
        assert!(!doc.insert_stylesheet(sheet(2)));

        assert!(doc.remove_stylesheet("toolA-stylesheet", MountId::from_raw(2)).is_none());
        assert!(doc.stylesheet("toolA-stylesheet").is_some());
        assert!(doc.remove_stylesheet("toolA-stylesheet", MountId::from_raw(1)).is_some());
        assert!(doc.stylesheets().is_empty());
    }
}
