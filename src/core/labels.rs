//! Label track maintenance.
//!
//! A label records that a particular track (one per mesh edge during
//! streaming) currently occupies a particular arc. Labels are threaded two
//! ways: horizontally through all labels of one arc, and vertically through
//! the consecutive arcs one tag spans, monotone in scalar order. The zip
//! walks vertical chains to follow a path without scanning arcs; arc merges
//! walk horizontal chains to move labels in bulk.

use super::store::{ArcKey, GraphStore, LabelKey, LabelTag, NodeKey, ReebLabel, StoreValidationError};

impl GraphStore {
    /// Label with `tag` on `arc`, if present.
    #[must_use]
    pub(crate) fn arc_label_with_tag(&self, arc: ArcKey, tag: LabelTag) -> Option<LabelKey> {
        let mut cur = self.arcs[arc].label_head;
        while let Some(l) = cur {
            let label = &self.labels[l];
            if label.tag == tag {
                return Some(l);
            }
            cur = label.h_next;
        }
        None
    }

    /// Label with `tag` on some arc leaving `n` upward.
    #[must_use]
    pub(crate) fn find_up_label(&self, n: NodeKey, tag: LabelTag) -> Option<LabelKey> {
        let mut arc = self.nodes[n].arc_up;
        while let Some(a) = arc {
            if let Some(l) = self.arc_label_with_tag(a, tag) {
                return Some(l);
            }
            arc = self.arcs[a].up_next;
        }
        None
    }

    /// Installs `tag` on `arc`, threading it vertically after `after`.
    ///
    /// Idempotent per `(arc, tag)`: an existing label is returned untouched.
    pub(crate) fn set_label(
        &mut self,
        arc: ArcKey,
        tag: LabelTag,
        after: Option<LabelKey>,
    ) -> LabelKey {
        if let Some(existing) = self.arc_label_with_tag(arc, tag) {
            return existing;
        }
        let l = self.labels.insert(ReebLabel {
            arc,
            tag,
            h_prev: None,
            h_next: None,
            v_prev: after,
            v_next: None,
        });
        self.append_horizontal(arc, l);
        if let Some(p) = after {
            let p_next = self.labels[p].v_next;
            self.labels[l].v_next = p_next;
            if let Some(x) = p_next {
                self.labels[x].v_prev = Some(l);
            }
            self.labels[p].v_next = Some(l);
        }
        l
    }

    /// Installs a bridge label on `arc`, spliced into the vertical chain
    /// immediately before `before`.
    pub(crate) fn insert_label_before(
        &mut self,
        arc: ArcKey,
        tag: LabelTag,
        before: LabelKey,
    ) -> LabelKey {
        if let Some(existing) = self.arc_label_with_tag(arc, tag) {
            debug_assert!(false, "bridge would duplicate tag {tag} on arc {arc:?}");
            return existing;
        }
        let prev = self.labels[before].v_prev;
        let l = self.labels.insert(ReebLabel {
            arc,
            tag,
            h_prev: None,
            h_next: None,
            v_prev: prev,
            v_next: Some(before),
        });
        self.append_horizontal(arc, l);
        if let Some(p) = prev {
            self.labels[p].v_next = Some(l);
        }
        self.labels[before].v_prev = Some(l);
        l
    }

    /// Moves every label of `from` onto `to`.
    ///
    /// A label whose tag is already present on `to` dies instead; its
    /// vertical chain is rethreaded around it.
    pub(crate) fn transfer_labels(&mut self, from: ArcKey, to: ArcKey) {
        let mut cur = self.arcs[from].label_head;
        while let Some(l) = cur {
            let (tag, next) = {
                let label = &self.labels[l];
                (label.tag, label.h_next)
            };
            if self.arc_label_with_tag(to, tag).is_some() {
                self.unthread_vertical(l);
                self.labels.remove(l);
            } else {
                self.labels[l].arc = to;
                self.append_horizontal(to, l);
            }
            cur = next;
        }
        let arc = &mut self.arcs[from];
        arc.label_head = None;
        arc.label_tail = None;
    }

    /// Drops every label and clears the per-arc chains.
    pub(crate) fn flush_labels(&mut self) {
        for (_, arc) in &mut self.arcs {
            arc.label_head = None;
            arc.label_tail = None;
        }
        self.labels.clear();
    }

    fn append_horizontal(&mut self, arc: ArcKey, l: LabelKey) {
        let tail = self.arcs[arc].label_tail;
        {
            let label = &mut self.labels[l];
            label.h_prev = tail;
            label.h_next = None;
        }
        match tail {
            Some(t) => self.labels[t].h_next = Some(l),
            None => self.arcs[arc].label_head = Some(l),
        }
        self.arcs[arc].label_tail = Some(l);
    }

    fn unthread_vertical(&mut self, l: LabelKey) {
        let (prev, next) = {
            let label = &self.labels[l];
            (label.v_prev, label.v_next)
        };
        if let Some(p) = prev {
            self.labels[p].v_next = next;
        }
        if let Some(x) = next {
            self.labels[x].v_prev = prev;
        }
    }

    /// Label-chain portion of [`GraphStore::is_valid`].
    pub(crate) fn validate_label_chains(&self) -> Result<(), StoreValidationError> {
        // horizontal chains: every label belongs to the arc that links it,
        // each (arc, tag) pair at most once
        let mut seen = 0usize;
        for (ak, arc) in &self.arcs {
            let mut prev = None;
            let mut cur = arc.label_head;
            while let Some(l) = cur {
                let label = &self.labels[l];
                if label.arc != ak {
                    return Err(StoreValidationError::LabelChainCorrupt {
                        message: format!("label {l:?} is chained on arc {ak:?} but points elsewhere"),
                    });
                }
                if label.h_prev != prev {
                    return Err(StoreValidationError::LabelChainCorrupt {
                        message: format!("horizontal back link of label {l:?} is wrong"),
                    });
                }
                if self
                    .arc_label_with_tag(ak, label.tag)
                    .is_some_and(|first| first != l)
                {
                    return Err(StoreValidationError::LabelChainCorrupt {
                        message: format!("tag {} appears twice on arc {ak:?}", label.tag),
                    });
                }
                seen += 1;
                prev = Some(l);
                cur = label.h_next;
            }
            if arc.label_tail != prev {
                return Err(StoreValidationError::LabelChainCorrupt {
                    message: format!("label tail of arc {ak:?} is stale"),
                });
            }
        }
        if seen != self.labels.len() {
            return Err(StoreValidationError::LabelChainCorrupt {
                message: format!(
                    "{} labels live but {seen} reachable through horizontal chains",
                    self.labels.len()
                ),
            });
        }

        // vertical chains: consecutive labels of a tag span consecutive arcs
        for (lk, label) in &self.labels {
            if let Some(next) = label.v_next {
                let next_label = &self.labels[next];
                if next_label.tag != label.tag {
                    return Err(StoreValidationError::LabelChainCorrupt {
                        message: format!("vertical chain of label {lk:?} changes tag"),
                    });
                }
                if next_label.v_prev != Some(lk) {
                    return Err(StoreValidationError::LabelChainCorrupt {
                        message: format!("vertical back link after label {lk:?} is wrong"),
                    });
                }
                if self.arcs[next_label.arc].n0 != self.arcs[label.arc].n1 {
                    return Err(StoreValidationError::LabelChainCorrupt {
                        message: format!("vertical chain of tag {} is not contiguous", label.tag),
                    });
                }
            }
        }
        Ok(())
    }
}
