//! Self-play worker: a fixed set of episodes advanced in lock-step.
//!
//! Each simulation step runs the first search phase on every live episode,
//! sends the leaves that need it as one batch, blocks for the answer and
//! resumes exactly those episodes in the same order.

use log::{debug, error, info};
use rand::prelude::*;
use std::sync::Arc;

use crate::data::TrainingExampleHistory;
use crate::game::Game;
use crate::mcts::sampling::{max_action, mix_noise, weighted_action};
use crate::mcts::{Episode, EvaluationRequest, SelfPlayConfig};
use crate::selfplay::batch::RequestBatch;
use crate::selfplay::batch_manager::WorkerLink;
use crate::{Result, SelfPlayError};

/// What a worker produced before exiting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerSummary {
    pub worker_id: usize,
    pub games: usize,
    pub examples: usize,
    pub batches: usize,
}

pub struct Worker<G: Game> {
    link: WorkerLink,
    history: Arc<TrainingExampleHistory>,
    episodes: Vec<Episode<G>>,
    num_simulations: usize,
    temperature_threshold: usize,
    dirichlet_alpha: f32,
    dirichlet_weight: f32,
    rng: StdRng,
    summary: WorkerSummary,
}

impl<G: Game> Worker<G> {
    pub fn new(
        link: WorkerLink,
        config: &SelfPlayConfig,
        history: Arc<TrainingExampleHistory>,
    ) -> Self {
        let worker_id = link.worker_id();
        let episodes = (0..config.batch_size).map(|_| Episode::new(config.cpuct)).collect();

        Worker {
            link,
            history,
            episodes,
            num_simulations: config.num_simulations,
            temperature_threshold: config.temperature_threshold,
            dirichlet_alpha: config.dirichlet_alpha,
            dirichlet_weight: config.dirichlet_weight,
            rng: StdRng::seed_from_u64(config.worker_seed(worker_id)),
            summary: WorkerSummary {
                worker_id,
                ..WorkerSummary::default()
            },
        }
    }

    pub fn worker_id(&self) -> usize {
        self.summary.worker_id
    }

    pub fn episodes(&self) -> &[Episode<G>] {
        &self.episodes
    }

    fn live_episodes(&self) -> usize {
        self.episodes.iter().filter(|e| !e.is_retired()).count()
    }

    /// Plays every episode to the end and returns what was produced.
    ///
    /// On error the unfinished games are taken off the ongoing count.
    pub fn run(mut self) -> Result<WorkerSummary> {
        info!(
            "worker {} starting {} episodes",
            self.worker_id(),
            self.episodes.len()
        );
        self.link.games_started(self.episodes.len());

        if let Err(e) = self.play_all() {
            let abandoned = self.live_episodes();
            error!(
                "worker {} stopped with {} unfinished games: {}",
                self.summary.worker_id, abandoned, e
            );
            self.link.games_abandoned(abandoned);
            return Err(e);
        }

        info!(
            "worker {} done: {} games, {} examples, {} batches",
            self.summary.worker_id, self.summary.games, self.summary.examples, self.summary.batches
        );
        Ok(self.summary)
    }

    fn play_all(&mut self) -> Result<()> {
        while self.live_episodes() > 0 {
            for _ in 0..self.num_simulations {
                self.simulation_step()?;
            }
            self.play_moves()?;
        }
        Ok(())
    }

    /// One simulation on every live episode, sharing one evaluation round trip.
    pub fn simulation_step(&mut self) -> Result<()> {
        let mut requested = Vec::new();
        let mut boards = Vec::new();

        for (index, episode) in self.episodes.iter_mut().enumerate() {
            if episode.is_retired() {
                continue;
            }
            if let EvaluationRequest::Needed(board) = episode.request_evaluation()? {
                requested.push(index);
                boards.push(board);
            }
        }

        self.link.submit(RequestBatch::new(self.worker_id(), boards))?;
        let response = self.link.await_result()?;
        response.check_len(requested.len())?;

        for ((&index, policy), &value) in requested
            .iter()
            .zip(response.policies.iter())
            .zip(response.values.iter())
        {
            self.episodes[index].resume_with_evaluation(policy, value)?;
        }

        self.summary.batches += 1;
        Ok(())
    }

    /// Picks and plays one move in every live episode, retiring finished games.
    ///
    /// While the move about to be played is below the temperature threshold
    /// it is sampled from the visit distribution mixed with Dirichlet noise;
    /// afterwards it is the most visited move.
    pub fn play_moves(&mut self) -> Result<()> {
        for episode in self.episodes.iter_mut() {
            if episode.is_retired() {
                continue;
            }

            let pi = episode.action_distribution();
            let legal = episode.legal_actions();
            let action = if samples_move(episode.moves_played(), self.temperature_threshold) {
                let mixed = mix_noise(
                    &pi,
                    &legal,
                    self.dirichlet_alpha,
                    self.dirichlet_weight,
                    &mut self.rng,
                )?;
                weighted_action(&mixed, Some(&legal), &mut self.rng)?
            } else {
                match max_action(&pi) {
                    Some(best) if pi[best] > 0.0 => best,
                    _ => legal.first().copied().ok_or(SelfPlayError::NoLegalActions)?,
                }
            };

            episode.apply_action(action)?;

            if episode.is_terminal() {
                let outcome = episode.outcome().unwrap_or(0.0);
                debug!(
                    "worker {} finished a game in {} moves (outcome {}):\n{}",
                    self.summary.worker_id,
                    episode.moves_played(),
                    outcome,
                    episode.state()
                );
                let examples = episode.finalize(outcome);
                self.summary.examples += examples.len();
                self.summary.games += 1;
                self.history.record_game(examples);
                self.link.game_finished();
            }
        }
        Ok(())
    }
}

/// Whether the next move is sampled rather than taken greedily. The move
/// being chosen counts, so a threshold of `t` samples `t - 1` moves.
fn samples_move(moves_played: usize, temperature_threshold: usize) -> bool {
    moves_played + 1 < temperature_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::TicTacToe;
    use crate::selfplay::batch::ResponseBatch;
    use crate::selfplay::batch_manager::BatchManager;
    use std::thread;
    use std::time::Duration;

    fn config(batch_size: usize) -> SelfPlayConfig {
        SelfPlayConfig {
            batch_size,
            num_threads: 1,
            num_simulations: 4,
            seed: Some(17),
            ..SelfPlayConfig::default()
        }
    }

    fn history() -> Arc<TrainingExampleHistory> {
        Arc::new(TrainingExampleHistory::new(&TicTacToe::layout()))
    }

    #[test]
    fn test_results_return_positionally() {
        let manager = BatchManager::new(1, Duration::from_secs(5));
        let link = manager.worker_link(0).unwrap();
        let mut worker: Worker<TicTacToe> = Worker::new(link, &config(3), history());

        let handle = thread::spawn(move || {
            worker.simulation_step().unwrap();
            worker
        });

        let request = loop {
            if let Some(batch) = manager.next_pending_timeout(Duration::from_millis(50)).unwrap() {
                break batch;
            }
        };
        assert_eq!(request.worker_id, 0);
        assert_eq!(request.len(), 3);

        // Distinct value per position so each episode's root records its own
        let values = vec![0.1, 0.2, 0.3];
        manager
            .deliver(ResponseBatch::new(0, vec![vec![1.0 / 9.0; 9]; 3], values.clone()))
            .unwrap();

        let worker = handle.join().unwrap();
        for (episode, expected) in worker.episodes().iter().zip(values) {
            assert!((episode.root_q() - expected).abs() < 1e-6);
        }
    }

    /// X holds 0 and 1, O holds 3 and 4; X wins by playing 2
    fn winning_episode() -> Episode<TicTacToe> {
        let mut state = TicTacToe::new();
        for action in [0, 3, 1, 4] {
            state.apply_action(action).unwrap();
        }
        let mut episode = Episode::from_state(state, 4.0);
        assert!(matches!(
            episode.request_evaluation().unwrap(),
            EvaluationRequest::Needed(_)
        ));
        let mut policy = vec![0.0; 9];
        policy[2] = 1.0;
        episode.resume_with_evaluation(&policy, 0.0).unwrap();
        episode
    }

    #[test]
    fn test_episode_without_request_is_skipped() {
        let manager = BatchManager::new(1, Duration::from_secs(5));
        let link = manager.worker_link(0).unwrap();
        let mut worker: Worker<TicTacToe> = Worker::new(link, &config(3), history());
        // The middle episode selects its expanded winning move, a terminal leaf
        worker.episodes[1] = winning_episode();

        let handle = thread::spawn(move || {
            worker.simulation_step().unwrap();
            worker
        });

        let request = loop {
            if let Some(batch) = manager.next_pending_timeout(Duration::from_millis(50)).unwrap() {
                break batch;
            }
        };
        assert_eq!(request.len(), 2);
        manager
            .deliver(ResponseBatch::new(0, vec![vec![1.0 / 9.0; 9]; 2], vec![0.1, 0.3]))
            .unwrap();

        let worker = handle.join().unwrap();
        let root_q: Vec<f32> = worker.episodes().iter().map(|e| e.root_q()).collect();
        // The win backs up +1 onto a root that held 0 after one visit
        for (q, expected) in root_q.iter().zip([0.1, 0.5, 0.3]) {
            assert!((q - expected).abs() < 1e-6, "root q {:?}", root_q);
        }
    }

    #[test]
    fn test_sampling_stops_one_move_before_threshold() {
        let sampled = (0..20).filter(|&moves| samples_move(moves, 16)).count();
        assert_eq!(sampled, 15);
        assert!(samples_move(14, 16));
        assert!(!samples_move(15, 16));
        assert!(!samples_move(0, 0));
    }

    #[test]
    fn test_failed_worker_releases_its_games() {
        let manager = BatchManager::new(1, Duration::from_millis(50));
        let link = manager.worker_link(0).unwrap();
        let worker: Worker<TicTacToe> = Worker::new(link, &config(3), history());

        assert!(matches!(
            worker.run(),
            Err(SelfPlayError::EvaluationTimeout { worker_id: 0, .. })
        ));
        assert_eq!(manager.ongoing_games(), 0);
        assert_eq!(manager.completed_games(), 0);
    }

    #[test]
    fn test_short_response_is_rejected() {
        let manager = BatchManager::new(1, Duration::from_secs(5));
        let link = manager.worker_link(0).unwrap();
        let mut worker: Worker<TicTacToe> = Worker::new(link, &config(2), history());

        let handle = thread::spawn(move || worker.simulation_step());
        let request = loop {
            if let Some(batch) = manager.next_pending_timeout(Duration::from_millis(50)).unwrap() {
                break batch;
            }
        };
        assert_eq!(request.len(), 2);
        manager
            .deliver(ResponseBatch::new(0, vec![vec![0.0; 9]], vec![0.0]))
            .unwrap();

        assert!(matches!(
            handle.join().unwrap(),
            Err(SelfPlayError::BatchLength { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_missing_evaluator_times_out() {
        let manager = BatchManager::new(1, Duration::from_millis(50));
        let link = manager.worker_link(0).unwrap();
        let mut worker: Worker<TicTacToe> = Worker::new(link, &config(1), history());

        assert!(matches!(
            worker.simulation_step(),
            Err(SelfPlayError::EvaluationTimeout { worker_id: 0, .. })
        ));
    }
}
