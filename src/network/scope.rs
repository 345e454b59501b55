// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session and frame scoping keys

use std::fmt;

use serde::{Deserialize, Serialize};

/// Browsing session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One frame of an intercepted session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameScope {
    /// Renderer process hosting the frame
    pub process_id: i32,
    /// Frame id within that process
    pub render_frame_id: i32,
    /// Process-independent frame tree node id
    pub frame_tree_node_id: i32,
}

impl FrameScope {
    pub fn new(process_id: i32, render_frame_id: i32, frame_tree_node_id: i32) -> Self {
        Self {
            process_id,
            render_frame_id,
            frame_tree_node_id,
        }
    }

    /// Binding keys this frame registers, most specific first
    pub fn keys(&self) -> [ScopeKey; 2] {
        [
            ScopeKey::RenderFrame {
                process_id: self.process_id,
                render_frame_id: self.render_frame_id,
            },
            ScopeKey::FrameTreeNode(self.frame_tree_node_id),
        ]
    }
}

/// Key of a session binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKey {
    RenderFrame { process_id: i32, render_frame_id: i32 },
    FrameTreeNode(i32),
}

/// Scoping identifiers a request carries at admission time.
///
/// Subresource requests know their render frame; navigations usually only
/// know the frame tree node they will commit in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestScope {
    pub render_frame: Option<(i32, i32)>,
    pub frame_tree_node_id: Option<i32>,
}

impl RequestScope {
    /// Scope of a subresource request issued by a frame
    pub fn frame(process_id: i32, render_frame_id: i32) -> Self {
        Self {
            render_frame: Some((process_id, render_frame_id)),
            frame_tree_node_id: None,
        }
    }

    /// Scope of a navigation targeting a frame tree node
    pub fn navigation(frame_tree_node_id: i32) -> Self {
        Self {
            render_frame: None,
            frame_tree_node_id: Some(frame_tree_node_id),
        }
    }

    /// Full scope of a known frame
    pub fn of(frame: &FrameScope) -> Self {
        Self {
            render_frame: Some((frame.process_id, frame.render_frame_id)),
            frame_tree_node_id: Some(frame.frame_tree_node_id),
        }
    }

    /// Lookup keys, most specific first
    pub fn lookup_keys(&self) -> impl Iterator<Item = ScopeKey> + '_ {
        let frame = self
            .render_frame
            .map(|(process_id, render_frame_id)| ScopeKey::RenderFrame {
                process_id,
                render_frame_id,
            });
        let node = self.frame_tree_node_id.map(ScopeKey::FrameTreeNode);
        frame.into_iter().chain(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_order() {
        let scope = RequestScope::of(&FrameScope::new(7, 3, 11));
        let keys: Vec<_> = scope.lookup_keys().collect();
        assert_eq!(
            keys,
            vec![
                ScopeKey::RenderFrame {
                    process_id: 7,
                    render_frame_id: 3
                },
                ScopeKey::FrameTreeNode(11),
            ]
        );
    }

    #[test]
    fn test_empty_scope_has_no_keys() {
        assert_eq!(RequestScope::default().lookup_keys().count(), 0);
    }
}
