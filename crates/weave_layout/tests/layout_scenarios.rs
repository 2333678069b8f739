//! End-to-end layout scenarios through the public pipeline API.

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use weave_core::{Point2, VirtualClock};
use weave_interact::{InteractionConfig, InteractionController, PositionedNode, RTreeIndex, RecordingRenderer};
use weave_layout::{
    BuiltinSimilarity, ClusteringContext, Dimensions, LayoutConfig, LayoutPipeline, Node, SharedFunctor, SharedNode,
    SimilarityError, SimilarityProcessor,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn services() -> Vec<SharedNode> {
    vec![
        Node::new("gateway").with_vector(vec![1.0, 0.1, 0.0]).with_connections(["auth", "orders"]).shared(),
        Node::new("auth").with_vector(vec![0.9, 0.2, 0.0]).shared(),
        Node::new("orders").with_vector(vec![0.0, 1.0, 0.3]).with_connections(["billing"]).shared(),
        Node::new("billing").with_vector(vec![0.1, 0.9, 0.4]).shared(),
        Node::new("metrics").with_vector(vec![0.0, 0.0, 1.0]).shared(),
    ]
}

#[test]
fn three_nodes_keep_their_identity() {
    init_tracing();
    let mut pipeline = LayoutPipeline::new(LayoutConfig::default(), VirtualClock::new().shared()).unwrap();
    let nodes: Vec<SharedNode> = ["a", "b", "c"].iter().map(|id| Node::new(*id).shared()).collect();

    let result = pollster::block_on(pipeline.calculate_layout_async(nodes.clone(), BuiltinSimilarity::Cosine.functor()));

    assert!(result.status.success);
    assert_eq!(result.nodes.len(), 3);
    for (i, enhanced) in result.nodes.iter().enumerate() {
        assert!(Arc::ptr_eq(&enhanced.original_node, &nodes[i]));
    }
}

#[test]
fn runtime_out_of_range_score_fails_the_run() {
    init_tracing();
    let mut pipeline = LayoutPipeline::new(LayoutConfig::default(), VirtualClock::new().shared()).unwrap();
    // well behaved for the registration probe, broken for real nodes
    let sneaky: SharedFunctor = Arc::new(|a: &Node, _: &Node, _: &ClusteringContext| {
        if a.id.starts_with("__probe") {
            0.5
        } else {
            1.5
        }
    });

    let result = pollster::block_on(pipeline.calculate_layout_async(services(), sneaky));

    assert!(!result.status.success);
    assert_eq!(result.status.errors.len(), 1);
    assert!(result.status.errors[0].contains("1.5"), "{}", result.status.errors[0]);
}

#[test]
fn processor_rejects_contract_breaking_functor() {
    let mut processor = SimilarityProcessor::new(VirtualClock::new().shared());
    let ctx = ClusteringContext::synthetic();
    let too_big = |_: &Node, _: &Node, _: &ClusteringContext| 1.5;

    let err = processor
        .calculate_similarity(&Node::new("a"), &Node::new("b"), &too_big, &ctx)
        .unwrap_err();
    assert!(matches!(err, SimilarityError::OutOfRange { .. }));
}

#[test]
fn cache_hit_counts_on_second_and_swapped_call() {
    let mut processor = SimilarityProcessor::new(VirtualClock::new().shared());
    let ctx = ClusteringContext::synthetic();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let functor = move |_: &Node, _: &Node, _: &ClusteringContext| {
        counter.fetch_add(1, Ordering::SeqCst);
        0.25
    };
    let (a, b) = (Node::new("a"), Node::new("b"));

    processor.calculate_similarity(&a, &b, &functor, &ctx).unwrap();
    assert_eq!(processor.cache_statistics().hit_count, 0);
    processor.calculate_similarity(&a, &b, &functor, &ctx).unwrap();
    processor.calculate_similarity(&b, &a, &functor, &ctx).unwrap();
    assert_eq!(processor.cache_statistics().hit_count, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn cache_entries_expire_after_ttl() {
    let clock = VirtualClock::new();
    let mut processor = SimilarityProcessor::new(clock.shared());
    let ctx = ClusteringContext::synthetic();
    let (a, b) = (Node::new("a"), Node::new("b"));
    let functor = BuiltinSimilarity::Jaccard.functor();

    processor.calculate_similarity(&a, &b, functor.as_ref(), &ctx).unwrap();
    clock.advance(weave_layout::DEFAULT_CACHE_TTL_MS);
    processor.calculate_similarity(&a, &b, functor.as_ref(), &ctx).unwrap();

    let stats = processor.cache_statistics();
    assert_eq!(stats.hit_count, 0);
    assert_eq!(stats.expired_count, 1);
    assert_eq!(processor.metrics().calculations, 2);
}

#[test]
fn weighted_builtins_blend_vectors_and_tags() {
    let mut processor = SimilarityProcessor::new(VirtualClock::new().shared());
    processor.register_builtins().unwrap();
    let ctx = ClusteringContext::synthetic();
    let a = Node::new("a").with_vector(vec![1.0, 0.0]).with_tags(["x"]);
    let b = Node::new("b").with_vector(vec![1.0, 0.0]).with_tags(["y"]);

    let score = processor.calculate_weighted_similarity(&a, &b, &["cosine", "jaccard"], &ctx).unwrap();
    assert!((score - 0.5).abs() < 1e-9);
}

#[test]
fn yaml_configured_3d_layout_stays_in_depth_range() {
    init_tracing();
    let config = LayoutConfig::from_yaml("dimensions: 3\nbounds:\n  depth: 100\nseed: 5\n").unwrap();
    let mut pipeline = LayoutPipeline::new(config, VirtualClock::new().shared()).unwrap();

    let result = pollster::block_on(pipeline.calculate_layout_async(services(), BuiltinSimilarity::Cosine.functor()));

    assert!(result.status.success);
    assert_eq!(result.dimensions, Dimensions::Three);
    for node in &result.nodes {
        assert!(node.position.z.abs() <= 50.0);
        assert!((0.0..=800.0).contains(&node.position.x));
    }
    let flat = pollster::block_on(pipeline.switch_dimensions_async(2)).unwrap();
    assert_eq!(flat.deltas.len(), 5);
    assert_eq!(pipeline.current_dimensions(), Dimensions::Two);
}

#[test]
fn laid_out_nodes_feed_hit_testing() {
    init_tracing();
    let mut pipeline = LayoutPipeline::new(LayoutConfig::default(), VirtualClock::new().shared()).unwrap();
    let result = pollster::block_on(pipeline.calculate_layout_async(services(), BuiltinSimilarity::Cosine.functor()));
    assert!(result.status.success);

    let positioned: Vec<PositionedNode> = result
        .nodes
        .iter()
        .map(|n| PositionedNode::new(n.id.clone(), n.position.x, n.position.y).with_radius(6.0))
        .collect();

    let clock = VirtualClock::new();
    let mut controller = InteractionController::new(InteractionConfig::default(), clock.shared()).unwrap();
    controller
        .initialize(Box::new(RecordingRenderer::default()), 800.0, 600.0)
        .unwrap();
    controller.set_spatial_index(Some(Box::new(RTreeIndex::new())));
    controller.update_nodes(positioned);
    controller.fit_to_graph(false);

    let billing = result.node("billing").unwrap().position;
    let screen = controller
        .viewport()
        .borrow()
        .world_to_screen(Point2::new(billing.x, billing.y));
    assert_eq!(controller.get_node_at(screen.x, screen.y).as_deref(), Some("billing"));
}

fn embedded_nodes(count: usize, dims: usize) -> Vec<SharedNode> {
    let mut rng = StdRng::seed_from_u64(1000);
    (0..count)
        .map(|i| {
            let vector: Vec<f64> = (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect();
            Node::new(format!("svc-{}", i)).with_vector(vector).shared()
        })
        .collect()
}

#[test]
#[cfg_attr(debug_assertions, ignore = "wall-clock bound needs a release build")]
fn thousand_node_layout_finishes_within_a_second() {
    init_tracing();
    let config = LayoutConfig::default();
    let bounds = config.bounds;
    let mut pipeline = LayoutPipeline::with_system_clock(config).unwrap();
    let nodes = embedded_nodes(1000, 16);

    let started = Instant::now();
    let result = pollster::block_on(pipeline.calculate_layout_async(nodes, BuiltinSimilarity::Cosine.functor()));
    let elapsed = started.elapsed();

    assert!(result.status.success, "{:?}", result.status.errors);
    assert_eq!(result.nodes.len(), 1000);
    for node in &result.nodes {
        assert!(bounds.contains(node.position, Dimensions::Two), "{} at {:?}", node.id, node.position);
    }
    assert!(elapsed < Duration::from_secs(1), "took {:?}", elapsed);
}

#[test]
fn oversized_matrix_leaves_cache_untouched() {
    let config = LayoutConfig::from_yaml("cache:\n  capacity: 100\n").unwrap();
    let mut pipeline = LayoutPipeline::new(config, VirtualClock::new().shared()).unwrap();

    let result = pollster::block_on(pipeline.calculate_layout_async(embedded_nodes(20, 4), BuiltinSimilarity::Cosine.functor()));

    assert!(result.status.success);
    assert_eq!(result.metrics.calculations, 190);
    assert_eq!(pipeline.processor().cache_statistics().size, 0);
    assert_eq!(pipeline.processor().cache_statistics().eviction_count, 0);
}
