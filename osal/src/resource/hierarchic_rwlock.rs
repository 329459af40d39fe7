// Copyright (c) 2025 vivo Mobile Communication Co., Ltd.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Hierarchic registry of named read/write locks.
//!
//! Names are `/`-separated paths; a trailing separator is ignored, so
//! `"grp/"` and `"grp"` address the same node. Conflict rules:
//!
//! - A read lock needs: no write lock on the node, no write lock on any
//!   ancestor. Locks on descendants do not conflict.
//! - A write lock needs: the node and its whole subtree free, and no write
//!   lock on any ancestor. Read locks on ancestors do not conflict.
//!
//! Nodes exist only while they or their descendants are locked.

use super::LockError;
use blue_infra::impl_intrusive_adapter;
use blue_infra::list::{Link, List};
use blue_infra::SharedString;

struct Node {
    name: SharedString,
    /// `-1` one writer, `0` free, `> 0` reader count.
    locks: i32,
    /// Number of locks held by strict descendants.
    descendant_locks: usize,
    children: List<Node, NodeLink>,
    link: Link,
}

impl_intrusive_adapter!(NodeLink, Node, link);

impl Node {
    fn new(name: &str) -> Box<Node> {
        Box::new(Node {
            name: SharedString::new(name),
            locks: 0,
            descendant_locks: 0,
            children: List::new(),
            link: Link::new(),
        })
    }

    fn find_child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name.as_str() == name)
    }

    fn find_child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|c| c.name.as_str() == name)
    }
}

pub struct HierarchicNamedRwLock {
    root: Node,
    nb_locks: usize,
}

impl Default for HierarchicNamedRwLock {
    fn default() -> Self {
        Self::new()
    }
}

fn components(name: &str) -> Result<Vec<&str>, LockError> {
    if name.is_empty() {
        return Err(LockError::InvalidName);
    }
    let mut parts: Vec<&str> = name.split('/').collect();
    if parts.last() == Some(&"") {
        parts.pop();
    }
    if parts.is_empty() {
        return Err(LockError::InvalidName);
    }
    Ok(parts)
}

impl HierarchicNamedRwLock {
    pub fn new() -> Self {
        Self {
            root: Node {
                name: SharedString::new(""),
                locks: 0,
                descendant_locks: 0,
                children: List::new(),
                link: Link::new(),
            },
            nb_locks: 0,
        }
    }

    /// Tries to acquire a read lock. False on conflict.
    pub fn lock_read(&mut self, name: &str) -> Result<bool, LockError> {
        let path = components(name)?;
        if !can_read(&self.root, &path) {
            return Ok(false);
        }
        if read_saturated(&self.root, &path) {
            return Err(LockError::TooManyReadLocks);
        }
        apply(&mut self.root, &path, false);
        self.nb_locks += 1;
        Ok(true)
    }

    /// Tries to acquire a write lock. False on conflict.
    pub fn lock_write(&mut self, name: &str) -> Result<bool, LockError> {
        let path = components(name)?;
        if !can_write(&self.root, &path) {
            return Ok(false);
        }
        apply(&mut self.root, &path, true);
        self.nb_locks += 1;
        Ok(true)
    }

    /// Releases one read lock.
    pub fn release_read(&mut self, name: &str) -> Result<(), LockError> {
        let path = components(name)?;
        release(&mut self.root, &path, false)?;
        self.nb_locks -= 1;
        Ok(())
    }

    /// Releases a write lock.
    pub fn release_write(&mut self, name: &str) -> Result<(), LockError> {
        let path = components(name)?;
        release(&mut self.root, &path, true)?;
        self.nb_locks -= 1;
        Ok(())
    }

    /// True if any lock is currently held.
    pub fn is_any_lock(&self) -> bool {
        self.nb_locks != 0
    }

    /// Drops all locks and nodes. Only valid when the owning subsystem can
    /// prove that nobody holds the locks anymore.
    pub fn reset(&mut self) {
        self.root.children.clear();
        self.root.descendant_locks = 0;
        self.nb_locks = 0;
    }
}

impl Drop for HierarchicNamedRwLock {
    fn drop(&mut self) {
        if self.nb_locks != 0 {
            panic!("HierarchicNamedRwLock::drop: locks still registered");
        }
    }
}

// 'node' is always the parent of path[0].

fn can_read(node: &Node, path: &[&str]) -> bool {
    let Some(child) = node.find_child(path[0]) else {
        return true;
    };
    if child.locks == -1 {
        return false;
    }
    if path.len() == 1 {
        true
    } else {
        can_read(child, &path[1..])
    }
}

fn read_saturated(node: &Node, path: &[&str]) -> bool {
    let Some(child) = node.find_child(path[0]) else {
        return false;
    };
    if path.len() == 1 {
        child.locks == i32::MAX
    } else {
        read_saturated(child, &path[1..])
    }
}

fn can_write(node: &Node, path: &[&str]) -> bool {
    let Some(child) = node.find_child(path[0]) else {
        return true;
    };
    if path.len() == 1 {
        child.locks == 0 && child.descendant_locks == 0
    } else {
        if child.locks == -1 {
            return false;
        }
        can_write(child, &path[1..])
    }
}

// Conflict freedom has been checked; creates missing nodes along the way.
fn apply(node: &mut Node, path: &[&str], write: bool) {
    if node.find_child(path[0]).is_none() {
        node.children.push_back(Node::new(path[0]));
    }
    let child = node.find_child_mut(path[0]).unwrap();

    if path.len() == 1 {
        if write {
            debug_assert_eq!(child.locks, 0);
            child.locks = -1;
        } else {
            child.locks += 1;
        }
    } else {
        child.descendant_locks += 1;
        apply(child, &path[1..], write);
    }
}

fn release(node: &mut Node, path: &[&str], write: bool) -> Result<(), LockError> {
    let Some(child) = node.find_child_mut(path[0]) else {
        return Err(LockError::NotLocked);
    };

    if path.len() == 1 {
        if write {
            if child.locks != -1 {
                return Err(LockError::NotLocked);
            }
            child.locks = 0;
        } else {
            if child.locks < 1 {
                return Err(LockError::NotLocked);
            }
            child.locks -= 1;
        }
    } else {
        release(child, &path[1..], write)?;
        child.descendant_locks -= 1;
    }

    if child.locks == 0 && child.descendant_locks == 0 && child.children.is_empty() {
        let ptr = child as *const Node;
        // Safety: 'ptr' was just obtained from this list and is dropped here
        unsafe {
            drop(node.children.remove(ptr));
        }
    }
    Ok(())
}
