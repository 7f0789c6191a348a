use crate::axis::{Axis, JogDirection};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JogSession {
    pub direction: JogDirection,
    pub speed: f64,
}

/// At most one continuous jog per axis.
#[derive(Debug, Default)]
pub struct JogTable {
    sessions: [Option<JogSession>; 2],
}

impl JogTable {
    pub fn get(&self, axis: Axis) -> Option<&JogSession> {
        self.sessions[axis.index()].as_ref()
    }

    /// Records a jog and returns the session it replaced, if any.
    pub fn start(&mut self, axis: Axis, session: JogSession) -> Option<JogSession> {
        self.sessions[axis.index()].replace(session)
    }

    pub fn stop(&mut self, axis: Axis) -> Option<JogSession> {
        self.sessions[axis.index()].take()
    }

    pub fn active(&self) -> Vec<Axis> {
        Axis::ALL
            .into_iter()
            .filter(|axis| self.sessions[axis.index()].is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.iter().all(Option::is_none)
    }

    /// Drops every session. Returns how many were active.
    pub fn clear(&mut self) -> usize {
        self.sessions
            .iter_mut()
            .filter_map(Option::take)
            .count()
    }
}
