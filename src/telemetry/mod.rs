//! Telemetry for the query pipeline
//!
//! Collects per-query events (cache lookups, stage completions, reflection
//! decisions, memory writes) and aggregates running statistics.

use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Pipeline event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    CacheLookup {
        partition: String,
        hit: bool,
        timestamp: Instant,
    },
    StageCompleted {
        stage: String,
        duration_ms: u64,
        success: bool,
        timestamp: Instant,
    },
    ReflectionDecision {
        action: String,
        iteration: usize,
        timestamp: Instant,
    },
    MemoryWrite {
        query_id: String,
        timestamp: Instant,
    },
    QueryCompleted {
        query_id: String,
        duration_ms: u64,
        cached: bool,
        timestamp: Instant,
    },
}

/// Running pipeline statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub stages_completed: usize,
    pub stages_failed: usize,
    pub reflection_decisions: usize,
    pub memory_writes: usize,
    pub queries_completed: usize,
    pub queries_served_from_cache: usize,
}

/// Telemetry collector shared across pipeline workers
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        // Update stats
        {
            let mut stats = self.stats.lock().unwrap();
            match &event {
                TelemetryEvent::CacheLookup { hit, .. } => {
                    if *hit {
                        stats.cache_hits += 1;
                    } else {
                        stats.cache_misses += 1;
                    }
                }
                TelemetryEvent::StageCompleted { success, .. } => {
                    if *success {
                        stats.stages_completed += 1;
                    } else {
                        stats.stages_failed += 1;
                    }
                }
                TelemetryEvent::ReflectionDecision { .. } => {
                    stats.reflection_decisions += 1;
                }
                TelemetryEvent::MemoryWrite { .. } => {
                    stats.memory_writes += 1;
                }
                TelemetryEvent::QueryCompleted { cached, .. } => {
                    stats.queries_completed += 1;
                    if *cached {
                        stats.queries_served_from_cache += 1;
                    }
                }
            }
        }

        // Store event
        let mut events = self.events.lock().unwrap();
        events.push(event);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        self.stats.lock().unwrap().clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = self.events.lock().unwrap();
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Fraction of cache lookups that hit
    pub fn cache_hit_rate(&self) -> f64 {
        let stats = self.stats.lock().unwrap();
        let total = stats.cache_hits + stats.cache_misses;
        if total == 0 {
            0.0
        } else {
            stats.cache_hits as f64 / total as f64
        }
    }

    /// Fraction of completed stages that succeeded
    pub fn stage_success_rate(&self) -> f64 {
        let stats = self.stats.lock().unwrap();
        let total = stats.stages_completed + stats.stages_failed;
        if total == 0 {
            1.0
        } else {
            stats.stages_completed as f64 / total as f64
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let collector = TelemetryCollector::new();
        assert_eq!(collector.event_count(), 0);
        let stats = collector.get_stats();
        assert_eq!(stats.queries_completed, 0);
    }

    #[test]
    fn test_record_cache_lookups() {
        let collector = TelemetryCollector::new();
        collector.record(TelemetryEvent::CacheLookup {
            partition: "query".to_string(),
            hit: true,
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::CacheLookup {
            partition: "query".to_string(),
            hit: false,
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert!((collector.cache_hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_stage_events() {
        let collector = TelemetryCollector::new();

        collector.record(TelemetryEvent::StageCompleted {
            stage: "retrieval".to_string(),
            duration_ms: 12,
            success: true,
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::StageCompleted {
            stage: "generation".to_string(),
            duration_ms: 340,
            success: false,
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.stages_completed, 1);
        assert_eq!(stats.stages_failed, 1);
        assert!((collector.stage_success_rate() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_query_completed_tracks_cached() {
        let collector = TelemetryCollector::new();
        collector.record(TelemetryEvent::QueryCompleted {
            query_id: "q1".to_string(),
            duration_ms: 5,
            cached: true,
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.queries_completed, 1);
        assert_eq!(stats.queries_served_from_cache, 1);
    }

    #[test]
    fn test_recent_events() {
        let collector = TelemetryCollector::new();

        for i in 0..10 {
            collector.record(TelemetryEvent::MemoryWrite {
                query_id: format!("q{}", i),
                timestamp: Instant::now(),
            });
        }

        let recent = collector.recent_events(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(collector.get_stats().memory_writes, 10);
    }

    #[test]
    fn test_empty_hit_rate_is_zero() {
        let collector = TelemetryCollector::new();
        assert_eq!(collector.cache_hit_rate(), 0.0);
        assert_eq!(collector.stage_success_rate(), 1.0);
    }
}
