//! Channel Queue: FIFO of pending incidents for one channel.
//!
//! Only the scheduler owns queues. Incidents leave from the front once the
//! resolver reaches a terminal outcome, or all at once under the flood rule.

use std::collections::VecDeque;

use crate::error::{TriageError, TriageResult};
use crate::incident::{Channel, Incident};

#[derive(Debug, Clone)]
pub struct ChannelQueue {
    channel: Channel,
    items: VecDeque<Incident>,
}

impl ChannelQueue {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            items: VecDeque::new(),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Append an incident. Rejects ids already present; the queued entry
    /// is kept untouched.
    pub fn enqueue(&mut self, incident: Incident) -> TriageResult<()> {
        self.ensure_absent(&incident.id)?;
        self.items.push_back(incident);
        Ok(())
    }

    /// Put an incident back at the head, e.g. after an abandoned remediation.
    pub fn push_front(&mut self, incident: Incident) -> TriageResult<()> {
        self.ensure_absent(&incident.id)?;
        self.items.push_front(incident);
        Ok(())
    }

    pub fn peek_head(&self) -> Option<&Incident> {
        self.items.front()
    }

    pub fn head_mut(&mut self) -> Option<&mut Incident> {
        self.items.front_mut()
    }

    pub fn remove_head(&mut self) -> Option<Incident> {
        self.items.pop_front()
    }

    /// Remove and return every queued incident in arrival order.
    pub fn drain_all(&mut self) -> Vec<Incident> {
        self.items.drain(..).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Incident> {
        self.items.iter()
    }

    fn ensure_absent(&self, id: &str) -> TriageResult<()> {
        if self.contains(id) {
            return Err(TriageError::DuplicateIncident {
                channel: self.channel,
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incident(id: &str) -> Incident {
        Incident::new(Channel::PagingAlert, id, format!("alert {id}"))
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = ChannelQueue::new(Channel::PagingAlert);
        queue.enqueue(incident("OG-1")).unwrap();
        queue.enqueue(incident("OG-2")).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek_head().unwrap().id, "OG-1");
        assert_eq!(queue.remove_head().unwrap().id, "OG-1");
        assert_eq!(queue.remove_head().unwrap().id, "OG-2");
        assert!(queue.remove_head().is_none());
    }

    #[test]
    fn test_duplicate_rejected_original_kept() {
        let mut queue = ChannelQueue::new(Channel::PagingAlert);
        queue.enqueue(incident("OG-1")).unwrap();

        let mut dup = incident("OG-1");
        dup.description = "replacement".into();
        let err = queue.enqueue(dup).unwrap_err();

        assert!(matches!(err, TriageError::DuplicateIncident { ref id, .. } if id == "OG-1"));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek_head().unwrap().description, "alert OG-1");
    }

    #[test]
    fn test_drain_all_empties_queue() {
        let mut queue = ChannelQueue::new(Channel::ChatAlert);
        for id in ["S-1", "S-2", "S-3"] {
            queue.enqueue(Incident::new(Channel::ChatAlert, id, id)).unwrap();
        }
        let drained = queue.drain_all();
        let ids: Vec<_> = drained.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["S-1", "S-2", "S-3"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_front_requeues_at_head() {
        let mut queue = ChannelQueue::new(Channel::PagingAlert);
        queue.enqueue(incident("OG-2")).unwrap();
        queue.push_front(incident("OG-1")).unwrap();
        assert_eq!(queue.peek_head().unwrap().id, "OG-1");
        assert!(queue.push_front(incident("OG-2")).is_err());
    }

    #[test]
    fn test_id_reusable_after_removal() {
        let mut queue = ChannelQueue::new(Channel::PagingAlert);
        queue.enqueue(incident("OG-1")).unwrap();
        queue.remove_head();
        assert!(queue.enqueue(incident("OG-1")).is_ok());
    }
}
