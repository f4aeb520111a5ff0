use seir_setup::runner::run_with_args;

fn main() {
    match run_with_args() {
        Ok(replicates) => {
            for replicate in &replicates {
                let p = &replicate.parameters;
                let (nt, nnodes) = p.beta.shape();
                println!(
                    "replicate {}: {} imported, alpha={:.4}, sigma={:.4}, gamma={:.4}, beta[0][0]={:.4} ({}x{})",
                    replicate.replicate_id,
                    replicate.seeding.sum(),
                    p.alpha,
                    p.sigma,
                    p.gamma,
                    p.beta[(0, 0)],
                    nt,
                    nnodes
                );
            }
        }
        Err(e) => {
            eprintln!("seir-setup: {e}");
            std::process::exit(1);
        }
    }
}
