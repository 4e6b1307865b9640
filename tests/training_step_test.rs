//! End-to-end exercise of one training step: sample span pairs, "encode" them
//! with a differentiable stand-in, gather across simulated replicas, and
//! backpropagate.

use contrast_rs::autograd::Variable;
use contrast_rs::distributed::{ReplicaWorld, RingBackend};
use contrast_rs::gather::all_gather_anchor_positive_pairs;
use contrast_rs::sampler::sample_anchor_positive_pairs;
use contrast_rs::tensor::Tensor;
use contrast_rs::text::{SpanBatch, TokenBatch, TokenFields};
use std::thread;

fn span_batch(batch: usize, spans: usize, seq: usize) -> SpanBatch<i64> {
    let ids = Tensor::new((0..(batch * spans * seq) as i64).collect(), [batch, spans, seq]).unwrap();
    let mask = Tensor::ones([batch, spans, seq]);
    let types = Tensor::zeros([batch, spans, seq]);
    TokenFields::new(ids, mask, types).unwrap()
}

/// Stand-in for the external encoder: one f32 "embedding" per token position,
/// wrapped as a leaf Variable (gradient history starts here, exactly like a
/// real encoder's output would carry history back to its weights).
fn encode(tokens: &TokenBatch<i64>) -> Variable<f32, 2> {
    let data = tokens
        .token_ids
        .data()
        .iter()
        .map(|&v| v as f32)
        .collect::<Vec<_>>();
    Variable::new(Tensor::new(data, *tokens.token_ids.shape()).unwrap())
}

#[test]
fn test_single_replica_step() {
    let batch = span_batch(4, 3, 5);
    let (anchors, positives) = sample_anchor_positive_pairs(&batch).unwrap();

    let anchor_emb = encode(&anchors);
    let positive_emb = encode(&positives);

    let world = ReplicaWorld::<RingBackend>::Standalone;
    let (anchor_emb, positive_emb) =
        all_gather_anchor_positive_pairs(&world, anchor_emb, positive_emb).unwrap();

    assert_eq!(anchor_emb.data.shape(), &[4, 5]);
    assert_eq!(positive_emb.data.shape(), &[4, 5]);

    // A quadratic loss still reaches the leaves.
    let loss = anchor_emb.clone() * anchor_emb.clone();
    loss.backward();
    assert!(anchor_emb.grad.borrow().is_some());
}

#[test]
fn test_two_replica_step() {
    let world_size = 2;
    let (batch, spans, seq) = (3, 4, 6);
    let mut handles = vec![];

    for backend in RingBackend::ring(world_size) {
        let handle = thread::spawn(move || {
            // Each replica samples its own spans; no cross-replica agreement
            // on the draw is required, only on tensor shapes.
            let tokens = span_batch(batch, spans, seq);
            let (anchors, positives) = sample_anchor_positive_pairs(&tokens).unwrap();

            let anchor_emb = encode(&anchors);
            let positive_emb = encode(&positives);
            let local = anchor_emb.clone();

            let world = ReplicaWorld::Distributed(backend);
            let (anchor_emb, positive_emb) =
                all_gather_anchor_positive_pairs(&world, anchor_emb, positive_emb).unwrap();

            assert_eq!(anchor_emb.data.shape(), &[world_size * batch, seq]);
            assert_eq!(positive_emb.data.shape(), &[world_size * batch, seq]);

            let loss = anchor_emb.clone() * anchor_emb;
            loss.backward();

            // d(sum x^2)/dx = 2x over the local slice.
            let grad = local.grad.borrow();
            let grad = grad.as_ref().unwrap();
            for (g, v) in grad.data().iter().zip(local.data.data()) {
                assert_eq!(*g, 2.0 * v);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }
}
