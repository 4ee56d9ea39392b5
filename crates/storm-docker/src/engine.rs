//! Docker engine access for one node.
//!
//! Run commands arrive as `docker run -d` argument vectors; the supported
//! flag subset is translated into an engine create request. Remote engines
//! are reached over plain HTTP on the standard daemon port.

use crate::error::{HandlerError, Result};
use bollard::container::{Config, CreateContainerOptions, RemoveContainerOptions};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info};

pub const ENGINE_PORT: u16 = 2375;
const ENGINE_TIMEOUT_SECS: u64 = 120;

/// The flag subset of `docker run` the canonical recipes emit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSpec {
    pub name: Option<String>,
    pub image: String,
    pub env: Vec<String>,
    /// `(host, container)` port pairs
    pub ports: Vec<(u16, u16)>,
    pub network: Option<String>,
    pub volumes: Vec<String>,
    pub cmd: Vec<String>,
}

impl RunSpec {
    pub fn parse(args: &[String]) -> Result<Self> {
        fn value_of(iter: &mut std::slice::Iter<'_, String>, flag: &str) -> Result<String> {
            iter.next()
                .cloned()
                .ok_or_else(|| HandlerError::recipe(format!("{} expects a value", flag)))
        }

        let mut spec = Self::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--name" => spec.name = Some(value_of(&mut iter, "--name")?),
                "-e" | "--env" => spec.env.push(value_of(&mut iter, "--env")?),
                "-v" | "--volume" => spec.volumes.push(value_of(&mut iter, "--volume")?),
                "--net" | "--network" => spec.network = Some(value_of(&mut iter, "--network")?),
                "-p" | "--publish" => {
                    let value = value_of(&mut iter, "--publish")?;
                    let (host, container) = value
                        .split_once(':')
                        .ok_or_else(|| HandlerError::recipe(format!("bad port spec {}", value)))?;
                    let host = host
                        .parse()
                        .map_err(|_| HandlerError::recipe(format!("bad host port {}", host)))?;
                    let container = container.parse().map_err(|_| {
                        HandlerError::recipe(format!("bad container port {}", container))
                    })?;
                    spec.ports.push((host, container));
                }
                flag if flag.starts_with('-') => {
                    return Err(HandlerError::recipe(format!(
                        "unsupported docker argument {}",
                        flag
                    )));
                }
                image => {
                    spec.image = image.to_string();
                    spec.cmd = iter.as_slice().to_vec();
                    break;
                }
            }
        }

        if spec.image.is_empty() {
            return Err(HandlerError::recipe("run command names no image"));
        }
        Ok(spec)
    }
}

/// Client for the docker engine of one node
pub struct NodeEngine {
    docker: Docker,
    address: String,
}

impl NodeEngine {
    pub fn connect(address: &str) -> Result<Self> {
        let docker = Docker::connect_with_http(
            &format!("http://{}:{}", address, ENGINE_PORT),
            ENGINE_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )?;
        Ok(Self {
            docker,
            address: address.to_string(),
        })
    }

    /// `docker run -d`: create and start, return the container id
    pub async fn run(&self, spec: &RunSpec) -> Result<String> {
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        for (host, container) in &spec.ports {
            let key = format!("{}/tcp", container);
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(host.to_string()),
                }]),
            );
        }

        let host_config = HostConfig {
            network_mode: spec.network.clone(),
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            binds: (!spec.volumes.is_empty()).then(|| spec.volumes.clone()),
            ..Default::default()
        };
        let config = Config {
            image: Some(spec.image.clone()),
            cmd: (!spec.cmd.is_empty()).then(|| spec.cmd.clone()),
            env: (!spec.env.is_empty()).then(|| spec.env.clone()),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = spec.name.as_ref().map(|name| CreateContainerOptions {
            name: name.as_str(),
            ..Default::default()
        });
        let created = self.docker.create_container(options, config).await?;
        self.docker
            .start_container::<String>(&created.id, None)
            .await?;

        info!("Started container {} on {}", created.id, self.address);
        Ok(created.id)
    }

    /// Execute a command inside a running container, returning its output
    pub async fn exec_in(&self, container: &str, cmd: &[String]) -> Result<String> {
        let exec = self
            .docker
            .create_exec(
                container,
                CreateExecOptions {
                    cmd: Some(cmd.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let mut collected = String::new();
        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = output.next().await {
                collected.push_str(&chunk?.to_string());
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        match inspect.exit_code {
            Some(0) | None => {
                debug!("exec {:?} in {} succeeded", cmd, container);
                Ok(collected)
            }
            Some(code) => Err(HandlerError::CommandFailed(format!(
                "{:?} exited with {}: {}",
                cmd,
                code,
                collected.trim()
            ))),
        }
    }

    /// Force-remove a container
    pub async fn remove(&self, container: &str) -> Result<()> {
        self.docker
            .remove_container(
                container,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await?;
        info!("Removed container {} on {}", container, self.address);
        Ok(())
    }
}
