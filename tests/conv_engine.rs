use convcore::arch::conv::loader;
use convcore::arch::conv::reference;
use convcore::arch::conv::{BankLayout, BankSet, ConvEngine, EngineState, FilterShape, Q24, StartCommand};
use convcore::simulator::utils::log::init_log;
use convcore::simulator::Job;

fn run_direct(job: &Job, layout: BankLayout) -> (Vec<Q24>, Vec<Q24>, u64) {
  init_log(true);
  let prepared = job.prepare().unwrap();
  let mut banks = BankSet::new(layout);
  loader::load(&mut banks, &prepared.image, prepared.image_size(), &prepared.coeffs).unwrap();

  let mut engine = ConvEngine::new();
  engine.start(&prepared.command, &mut banks).unwrap();
  let stats = engine.run_to_completion(&mut banks, 5_000_000).unwrap();
  assert_eq!(engine.state(), EngineState::Completed);

  let results = banks
    .read_results(0, prepared.command.output_count as usize)
    .unwrap();
  (results, prepared.reference().unwrap(), stats.cycles)
}

#[test]
fn four_by_four_image_three_by_three_filter() {
  let job = Job {
    filter_size: 3,
    stride: 1,
    image: vec![
      vec![0.5, -1.0, 2.0, 0.25],
      vec![1.5, 0.0, -0.75, 3.0],
      vec![-2.0, 1.0, 0.125, -0.5],
      vec![4.0, -3.5, 1.25, 0.0],
    ],
    filter: vec![vec![1.0, 0.0, -1.0], vec![2.0, 0.0, -2.0], vec![1.0, 0.0, -1.0]],
    layout: None,
  };
  let (results, expected, _) = run_direct(&job, BankLayout::ColumnPair);
  assert_eq!(results.len(), 4);
  assert_eq!(results, expected);

  // Sobel-x at (0,0): (0.5 - 2.0) + 2*(1.5 + 0.75) + (-2.0 - 0.125) = 0.875
  assert_eq!(results[0], Q24::from_f64(0.875));
}

#[test]
fn window_count_follows_stride_and_shape() {
  for (size, filter, stride) in [(17u16, 3u8, 2u8), (32, 5, 3), (25, 8, 7), (9, 4, 5)] {
    let job = Job::synthetic(size, filter, stride);
    let (results, expected, _) = run_direct(&job, BankLayout::ColumnPair);
    let per_axis = (size as usize - filter as usize) / stride as usize + 1;
    assert_eq!(results.len(), per_axis * per_axis);
    assert_eq!(results, expected);
  }
}

#[test]
fn worst_case_layout_costs_cycles_not_accuracy() {
  let job = Job::synthetic(20, 8, 2);
  let (fast, expected, fast_cycles) = run_direct(&job, BankLayout::ColumnPair);
  let (slow, _, slow_cycles) = run_direct(&job, BankLayout::RowInterleaved);
  assert_eq!(fast, expected);
  assert_eq!(slow, expected);
  assert!(slow_cycles > fast_cycles);
}

#[test]
fn largest_image_fits_the_banks() {
  let job = Job::synthetic(256, 8, 7);
  let (results, expected, _) = run_direct(&job, BankLayout::RowInterleaved);
  assert_eq!(results.len(), 36 * 36);
  assert_eq!(results, expected);
}

#[test]
fn reference_agrees_with_engine_for_every_shape() {
  for shape in FilterShape::ALL {
    let dim = shape.dim() as u8;
    let job = Job::synthetic(u16::from(dim) + 5, dim, 1);
    let (results, expected, _) = run_direct(&job, BankLayout::ColumnPair);
    assert_eq!(results, expected, "{}", shape);
  }
}

#[test]
fn start_command_serializes_as_plain_fields() {
  let cmd = StartCommand::for_geometry(FilterShape::K5, 2, 11).unwrap();
  let json = serde_json::to_value(cmd).unwrap();
  assert_eq!(
    json,
    serde_json::json!({ "filter_size": 5, "stride": 2, "image_size": 11, "output_count": 16 })
  );
}
