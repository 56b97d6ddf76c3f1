//! Benchmarks for samparse core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use samparse::{decode, rebuild, resolve_all, Chain, Context, Intrinsic, Resolve, Value};
use std::convert::Infallible;

const TEMPLATE: &str = r#"
AWSTemplateFormatVersion: '2010-09-09'
Transform: AWS::Serverless-2016-10-31
Parameters:
  Stage:
    Type: String
    Default: dev
Conditions:
  IsProd: !Equals [!Ref Stage, prod]
Globals:
  Function:
    Timeout: 30
    Runtime: python3.12
Resources:
  Api:
    Type: AWS::Serverless::Api
    Properties:
      StageName: !Ref Stage
  Hello:
    Type: AWS::Serverless::Function
    Properties:
      FunctionName: !Sub "hello-${Stage}"
      MemorySize: !If [IsProd, 1024, 128]
      Environment:
        Variables:
          TABLE: !Ref Table
          API: !GetAtt Api.RootResourceId
      Events:
        Get:
          Type: Api
          Properties:
            Path: /hello
            Method: get
            RestApiId: !Ref Api
  Table:
    Type: AWS::Serverless::SimpleTable
Outputs:
  Url:
    Value: !Join ["", ["https://", !Ref Api, ".execute-api/", !Ref Stage]]
"#;

struct Refs;

impl Resolve for Refs {
    type Error = Infallible;

    fn resolve(&self, _ctx: &Context, value: &Value) -> Result<Option<Value>, Infallible> {
        Ok(match value.as_intrinsic() {
            Some((Intrinsic::Ref, Value::String(name))) => Some(Value::from(format!("{name}-id"))),
            _ => None,
        })
    }
}

struct FalseBranch;

impl Resolve for FalseBranch {
    type Error = Infallible;

    fn resolve(&self, _ctx: &Context, value: &Value) -> Result<Option<Value>, Infallible> {
        Ok(match value.as_intrinsic() {
            Some((Intrinsic::If, Value::List(args))) if args.len() == 3 => Some(args[2].clone()),
            _ => None,
        })
    }
}

fn bench_decode(c: &mut Criterion) {
    c.bench_function("decode_template", |b| {
        b.iter(|| {
            let tree = decode(black_box(TEMPLATE)).unwrap();
            black_box(tree);
        });
    });
}

fn bench_resolve(c: &mut Criterion) {
    let tree = decode(TEMPLATE).unwrap();
    let chain = Chain::new().with(FalseBranch).with(Refs);
    let ctx = Context::with_max_depth(32);

    c.bench_function("resolve_template", |b| {
        b.iter(|| {
            let resolved = resolve_all(&ctx, black_box(&tree), Some(&chain)).unwrap();
            black_box(resolved);
        });
    });
}

fn bench_rebuild_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild_nested");
    for depth in [8, 32, 128] {
        let mut tree = Value::from("leaf");
        for i in 0..depth {
            tree = [(format!("level{i}"), tree)].into_iter().collect();
        }
        group.bench_with_input(BenchmarkId::from_parameter(depth), &tree, |b, tree| {
            b.iter(|| black_box(rebuild(&Context::default(), black_box(tree))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_resolve, bench_rebuild_depth);
criterion_main!(benches);
