// racer_sim/src/simulation/utils/serde_helpers.rs

pub mod vec3_from_array {
    use nalgebra::Vector3;
    use serde::{self, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vector3<f32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let arr: [f32; 3] = Deserialize::deserialize(deserializer)?;
        Ok(Vector3::from(arr))
    }
}

pub mod vec3_list_from_arrays {
    use nalgebra::Vector3;
    use serde::{self, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vector3<f32>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let arrays: Vec<[f32; 3]> = Deserialize::deserialize(deserializer)?;
        Ok(arrays.into_iter().map(Vector3::from).collect())
    }
}

pub mod quat_from_euler_deg {
    use nalgebra::UnitQuaternion;
    use serde::{self, Deserialize, Deserializer};

    /// Reads `[x, y, z]` rotations in degrees. A heading is `[0, yaw, 0]`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<UnitQuaternion<f32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let arr: [f32; 3] = Deserialize::deserialize(deserializer)?;
        Ok(UnitQuaternion::from_euler_angles(
            arr[0].to_radians(),
            arr[1].to_radians(),
            arr[2].to_radians(),
        ))
    }
}
