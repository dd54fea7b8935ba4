//! Property-based tests for archipelago
//!
//! Uses proptest to verify invariants of graphs, policies and the engine.

use archipelago::prelude::*;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn sum(genes: &[f64]) -> f64 {
    genes.iter().sum()
}

fn population(fitness: &[f64]) -> Population {
    Population::from_individuals(
        fitness
            .iter()
            .enumerate()
            .map(|(i, &f)| Individual::with_fitness(i, RealVector::new(vec![f, 0.0]), f))
            .collect(),
    )
}

fn pickup_strategy() -> impl Strategy<Value = PickupPolicy> {
    prop_oneof![
        Just(PickupPolicy::Random),
        Just(PickupPolicy::Elite),
        Just(PickupPolicy::Poor),
    ]
}

fn replacement_strategy() -> impl Strategy<Value = ReplacementPolicy> {
    prop_oneof![
        Just(ReplacementPolicy::Random),
        Just(ReplacementPolicy::Elite),
        Just(ReplacementPolicy::Poor),
    ]
}

/// Source lists for `n` vertices with every endpoint in range
fn sources_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..8).prop_flat_map(|n| prop::collection::vec(prop::collection::vec(0..n, 0..4), n))
}

proptest! {
    // ==================== Graph Properties ====================

    #[test]
    fn graph_render_parse_roundtrip(sources in sources_strategy()) {
        let graph = ConnectivityGraph::from_sources(sources).unwrap();
        let reparsed = ConnectivityGraph::parse_str(&graph.render(GraphForm::Simple), GraphForm::Simple).unwrap();
        prop_assert_eq!(&reparsed, &graph);

        let full = ConnectivityGraph::parse_str(&graph.render(GraphForm::Full), GraphForm::Full).unwrap();
        prop_assert_eq!(&full, &graph);
    }

    #[test]
    fn graph_edges_are_mirrored(sources in sources_strategy()) {
        let graph = ConnectivityGraph::from_sources(sources).unwrap();
        let mut in_total = 0;
        let mut out_total = 0;
        for v in 0..graph.vertex_count() {
            in_total += graph.in_degree(v);
            out_total += graph.out_degree(v);
            for &s in graph.sources(v) {
                prop_assert!(graph.destinations(s).contains(&v));
            }
            prop_assert!(!graph.neighbors(v).contains(&v));
        }
        prop_assert_eq!(in_total, graph.edge_count());
        prop_assert_eq!(out_total, graph.edge_count());
    }

    #[test]
    fn generated_topologies_have_one_record_per_island(n in 1usize..12) {
        for kind in [TopologyKind::Ring, TopologyKind::FullyConnected, TopologyKind::Star { hub: 0 }] {
            let graph = kind.build(n).unwrap();
            prop_assert_eq!(graph.vertex_count(), n);
        }
    }

    // ==================== Policy Properties ====================

    #[test]
    fn pickup_keeps_population_size(
        fitness in prop::collection::vec(-50.0..50.0f64, 2..30),
        count in 0usize..40,
        policy in pickup_strategy(),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pop = population(&fitness);
        let bounds = MultiBounds::symmetric(1.0, 2);
        let view = MigrationView { population: &mut pop, fitness: &sum, bounds: &bounds };

        let emigrants = policy.pickup(view, count, &mut rng);
        prop_assert_eq!(emigrants.len(), count.min(fitness.len()));
        prop_assert_eq!(pop.len(), fitness.len());
        prop_assert!(pop.all_evaluated());
    }

    #[test]
    fn elite_pickup_takes_the_best(
        fitness in prop::collection::vec(-50.0..50.0f64, 2..30),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pop = population(&fitness);
        let best = pop.best().unwrap().fitness;
        let bounds = MultiBounds::symmetric(1.0, 2);
        let view = MigrationView { population: &mut pop, fitness: &sum, bounds: &bounds };

        let emigrants = PickupPolicy::Elite.pickup(view, 1, &mut rng);
        prop_assert_eq!(emigrants[0].fitness, best);
    }

    #[test]
    fn replacement_overwrites_at_most_population(
        fitness in prop::collection::vec(-50.0..50.0f64, 2..20),
        incoming in 0usize..30,
        policy in replacement_strategy(),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pop = population(&fitness);
        let bounds = MultiBounds::symmetric(1.0, 2);
        let immigrants = vec![RealVector::new(vec![100.0, 100.0]); incoming];
        let view = MigrationView { population: &mut pop, fitness: &sum, bounds: &bounds };

        let replaced = policy.replace(view, &immigrants, &mut rng);
        prop_assert_eq!(replaced, incoming.min(fitness.len()));
        prop_assert_eq!(pop.len(), fitness.len());
        let arrived = pop.iter().filter(|i| i.fitness == Some(200.0)).count();
        prop_assert_eq!(arrived, replaced);
    }

    #[test]
    fn migration_fires_on_interval_multiples(interval in 1usize..20, generation in 0usize..500) {
        let plan = MigrationPlan {
            pickup: PickupPolicy::Random,
            replacement: ReplacementPolicy::Random,
            immigrants: 1,
            interval,
        };
        prop_assert_eq!(plan.is_migration_generation(generation), generation % interval == 0);
    }

    // ==================== Engine Properties ====================

    #[test]
    fn generation_keeps_population_size(
        size in 2usize..20,
        offspring in 2usize..10,
        seed in any::<u64>(),
    ) {
        let replacement = offspring.min(size) / 2;
        let mut ga = GeneticAlgorithm::builder()
            .population_size(size)
            .offspring(offspring)
            .replacement(replacement)
            .max_generations(5)
            .bounds(MultiBounds::symmetric(5.12, 3))
            .fitness(shared(Benchmark::Sphere))
            .selection(SelectionMethod::default())
            .crossover(CrossoverMethod::default())
            .mutation(MutationMethod::default())
            .seed(seed)
            .build()
            .unwrap();

        ga.evaluate_population();
        for _ in 0..5 {
            ga.evolve_one_generation().unwrap();
            prop_assert_eq!(ga.population().len(), size);
        }
        prop_assert_eq!(ga.bsf().len(), 5);
        prop_assert!(ga.bsf().windows(2).all(|w| w[1] >= w[0]));
    }
}
