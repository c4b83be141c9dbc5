//! Compiled contract artifacts and ABI coding.
//!
//! Artifacts are produced by an external compiler. This module only loads them and
//! uses their ABI to encode constructor arguments and read-only calls.

use std::path::{Path, PathBuf};

use alloy_core::dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier};
use alloy_core::json_abi::{Function, JsonAbi, StateMutability};
use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Bytecode and ABI of a compiled contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    pub contract_name: String,
    pub abi: JsonAbi,
    /// Creation bytecode (without constructor arguments).
    pub bytecode: Bytes,
}

/// Something able to produce an artifact given a contract name.
pub trait ArtifactSource {
    fn load(&self, contract_name: &str) -> Result<ContractArtifact>;
}

/// Bytecode as written by Hardhat (`"0x.."`) or Foundry (`{"object": "0x.."}`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(Bytes),
    Object { object: Bytes },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    #[serde(default)]
    contract_name: Option<String>,
    abi: JsonAbi,
    bytecode: RawBytecode,
}

impl ContractArtifact {
    /// Parse an artifact from its JSON representation.
    pub fn from_json(contract_name: &str, json: &str) -> Result<Self> {
        let raw: RawArtifact =
            serde_json::from_str(json).context("Failed to parse contract artifact JSON")?;

        if let Some(name) = raw.contract_name.as_deref().filter(|n| *n != contract_name) {
            anyhow::bail!(
                "Artifact is for contract '{}', expected '{}'",
                name,
                contract_name
            );
        }

        let bytecode = match raw.bytecode {
            RawBytecode::Hex(b) => b,
            RawBytecode::Object { object } => object,
        };

        if bytecode.is_empty() {
            anyhow::bail!(
                "Artifact for '{}' has no bytecode (interface or abstract contract?)",
                contract_name
            );
        }

        Ok(Self {
            contract_name: contract_name.to_string(),
            abi: raw.abi,
            bytecode,
        })
    }

    /// ABI-encode constructor arguments given as strings.
    ///
    /// Each argument is coerced to the type of the matching constructor parameter.
    /// A contract without an explicit constructor takes no arguments.
    pub fn encode_constructor_args(&self, args: &[String]) -> Result<Bytes> {
        let Some(constructor) = self.abi.constructor() else {
            if !args.is_empty() {
                anyhow::bail!(
                    "{} has no constructor but {} argument(s) were given",
                    self.contract_name,
                    args.len()
                );
            }
            return Ok(Bytes::new());
        };

        if constructor.inputs.len() != args.len() {
            anyhow::bail!(
                "{} constructor expects {} argument(s), got {}",
                self.contract_name,
                constructor.inputs.len(),
                args.len()
            );
        }

        let values = constructor
            .inputs
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                let ty: DynSolType = param
                    .resolve()
                    .with_context(|| format!("Unsupported parameter type '{}'", param.ty))?;
                ty.coerce_str(arg).with_context(|| {
                    format!("Invalid value '{}' for parameter '{}' ({})", arg, param.name, param.ty)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let encoded = constructor
            .abi_encode_input(&values)
            .context("Failed to encode constructor arguments")?;

        Ok(encoded.into())
    }

    /// Creation payload: bytecode followed by the encoded constructor arguments.
    pub fn creation_code(&self, encoded_args: &[u8]) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + encoded_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(encoded_args);
        code.into()
    }

    /// Find a zero-argument `view` or `pure` function by name.
    pub fn read_only_method(&self, name: &str) -> Result<&Function> {
        let overloads = self
            .abi
            .function(name)
            .with_context(|| format!("{} has no method '{}'", self.contract_name, name))?;

        let function = overloads
            .iter()
            .find(|f| f.inputs.is_empty())
            .with_context(|| format!("Method '{}' requires arguments", name))?;

        match function.state_mutability {
            StateMutability::View | StateMutability::Pure => Ok(function),
            other => anyhow::bail!("Method '{}' is not read-only ({:?})", name, other),
        }
    }
}

/// Calldata for a zero-argument call.
pub fn encode_call(function: &Function) -> Result<Bytes> {
    let data = function
        .abi_encode_input(&[])
        .with_context(|| format!("Failed to encode call to '{}'", function.name))?;
    Ok(data.into())
}

/// Decode the return data of `function` and render it as text.
pub fn decode_output(function: &Function, data: &[u8]) -> Result<String> {
    let values = function
        .abi_decode_output(data, true)
        .with_context(|| format!("Failed to decode output of '{}'", function.name))?;

    Ok(match values.as_slice() {
        [] => "()".to_string(),
        [single] => format_value(single),
        many => format!(
            "({})",
            many.iter().map(format_value).collect::<Vec<_>>().join(", ")
        ),
    })
}

/// Human-readable rendering of a decoded ABI value.
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Address(a) => a.to_checksum(None),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Bytes(b) => format!("0x{}", hex::encode(b)),
        DynSolValue::FixedBytes(word, size) => format!("0x{}", hex::encode(&word[..*size])),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => format!(
            "[{}]",
            items.iter().map(format_value).collect::<Vec<_>>().join(", ")
        ),
        DynSolValue::Tuple(items) => format!(
            "({})",
            items.iter().map(format_value).collect::<Vec<_>>().join(", ")
        ),
        other => format!("{:?}", other),
    }
}

/// Loads artifacts from a directory of compiler output.
///
/// Looks for `<dir>/<Name>.json`, then the Hardhat layout
/// `<dir>/<source dir>/<Name>.sol/<Name>.json`.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find(&self, contract_name: &str) -> Result<PathBuf> {
        let file_name = format!("{contract_name}.json");
        let sol_dir = format!("{contract_name}.sol");

        let flat = self.root.join(&file_name);
        if flat.is_file() {
            return Ok(flat);
        }

        let direct = self.root.join(&sol_dir).join(&file_name);
        if direct.is_file() {
            return Ok(direct);
        }

        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read artifacts directory {}", self.root.display()))?;
        for entry in entries {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let candidate = path.join(&sol_dir).join(&file_name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        anyhow::bail!(
            "No artifact found for '{}' under {}",
            contract_name,
            self.root.display()
        )
    }
}

impl ArtifactSource for ArtifactDir {
    fn load(&self, contract_name: &str) -> Result<ContractArtifact> {
        let path = self.find(contract_name)?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;

        tracing::debug!(contract = %contract_name, path = %path.display(), "Loaded artifact");

        ContractArtifact::from_json(contract_name, &content)
            .with_context(|| format!("Invalid artifact {}", path.display()))
    }
}
