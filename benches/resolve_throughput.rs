use std::fs;
use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use prov_deps::{DependencyResolver, ResolverConfig};

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, contents).expect("write");
}

fn bench_resolve(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tmp");
    let project = dir.path().join("project");
    let site = dir.path().join("site");
    let mut imports = Vec::new();
    for idx in 0..64 {
        let name = format!("lib{idx:02}");
        write(
            &site.join(&name).join("__init__.py"),
            &format!("__version__ = \"1.{idx}.0\"\n"),
        );
        write(&site.join(&name).join("core.py"), "");
        imports.push(name.clone());
        imports.push(format!("{name}.core"));
    }
    for idx in 0..16 {
        let name = format!("local{idx:02}");
        write(&project.join(format!("{name}.py")), "");
        imports.push(name);
    }

    let resolver = DependencyResolver::new(ResolverConfig::new(&project).with_search_roots([site]));
    c.bench_function("resolve_144_imports", |b| {
        b.iter(|| {
            let resolution = resolver.resolve(black_box(&imports));
            black_box(resolution.dependencies.len())
        })
    });
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
