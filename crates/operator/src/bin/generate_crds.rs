use anyhow::Context;
use jobset_operator::crd::JobSet;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = serde_yaml::to_string(&JobSet::crd()).context("serializing JobSet CRD")?;
    println!("---");
    println!("# JobSet CRD");
    println!("{}", crd);
    Ok(())
}
